//! Codec error types.

use thiserror::Error;

/// Why a wire frame failed to decode.
///
/// Decoding never panics; a malformed frame surfaces as one of these and the
/// caller drops the frame with a diagnostic.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame text is not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The top-level JSON value is not an object.
    #[error("frame is not a JSON object")]
    NotObject,

    /// The required `type` field is absent.
    #[error("frame has no `type` field")]
    MissingType,

    /// The `type` field is present but not a string.
    #[error("frame `type` field is not a string")]
    TypeNotString,
}

/// Why an envelope failed to encode.
///
/// Encoding a well-formed envelope never fails; this exists so serialization
/// problems propagate as values instead of panics.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("failed to serialize envelope: {0}")]
    Json(#[from] serde_json::Error),
}
