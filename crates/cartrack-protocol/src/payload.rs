//! Typed payload contracts per event kind.
//!
//! The `car` and `shift` bodies are open JSON objects — their schema belongs
//! to the dashboard and the tracking server, not to this client, so they
//! stay as [`Value`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a `connected` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// Sender-side ISO-8601 timestamp of session establishment.
    pub timestamp: String,
}

/// Payload of a `car_updated` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CarUpdatedPayload {
    /// The tracked package car that changed state.
    pub car: Value,
    /// Sender-side ISO-8601 timestamp.
    pub timestamp: String,
}

/// Payload of a `shift_started` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShiftStartedPayload {
    /// The shift that began.
    pub shift: Value,
    /// Sender-side ISO-8601 timestamp.
    pub timestamp: String,
}

/// Payload of an `active_users_updated` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUsersPayload {
    /// Current presence count.
    pub active_users: u64,
    /// Sender-side ISO-8601 timestamp.
    pub timestamp: Option<String>,
}
