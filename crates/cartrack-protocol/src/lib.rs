//! # cartrack-protocol
//!
//! Wire protocol for the Cartrack real-time channel.
//!
//! Cartrack dashboards keep a persistent WebSocket open to the tracking
//! server; every frame on that socket is a JSON text envelope with a `type`
//! field naming the event kind plus kind-specific payload fields. This crate
//! owns:
//!
//! - **[`EventKind`]**: Closed enumeration of known event kinds with exact
//!   wire strings
//! - **[`Envelope`]**: One discrete wire message — encode/decode with shape
//!   validation
//! - **Typed payloads**: per-kind payload contracts in [`payload`]
//! - **[`DecodeError`]**: Structured decode failures that never panic
//!
//! Unknown-but-well-formed `type` strings decode successfully so future
//! protocol extensions degrade gracefully; routing them is the consumer's
//! concern.

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod kind;
pub mod payload;

pub use envelope::Envelope;
pub use errors::{DecodeError, EncodeError};
pub use kind::{ALL_EVENT_KINDS, EventKind};
pub use payload::{
    ActiveUsersPayload, CarUpdatedPayload, ConnectedPayload, ShiftStartedPayload,
};

/// Current UTC time as an ISO-8601 string with millisecond precision.
///
/// Lifecycle envelopes carry a sender-set timestamp in this format.
pub fn wire_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_timestamp_is_iso8601() {
        let ts = wire_timestamp();
        assert!(ts.contains('T'));
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
