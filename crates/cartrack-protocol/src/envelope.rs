//! Message envelope codec.
//!
//! An [`Envelope`] is one discrete wire message: a `type` string naming the
//! event kind plus the kind-specific payload fields, flattened at the top
//! level of the JSON object:
//!
//! ```json
//! { "type": "car_updated", "car": { "id": "C12" }, "timestamp": "2026-01-01T00:00:00.000Z" }
//! ```
//!
//! [`Envelope::decode`] validates shape only — not valid JSON, not an
//! object, or a missing/non-string `type` are errors. An *unknown* `type`
//! string is not: it decodes successfully with [`Envelope::known_kind`]
//! returning `None`, so newer server versions can ship event kinds this
//! client has never heard of without breaking it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DecodeError, EncodeError};
use crate::kind::EventKind;

/// One discrete wire message with a typed kind and payload fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire event kind string (e.g. `car_updated`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific payload fields, flattened beside `type`.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Envelope {
    /// Build an envelope for a known kind.
    pub fn new(kind: EventKind, fields: Map<String, Value>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            fields,
        }
    }

    /// Build a bare envelope with no payload fields (heartbeats).
    pub fn bare(kind: EventKind) -> Self {
        Self::new(kind, Map::new())
    }

    /// Build the client-synthesized `connected` envelope with a fresh
    /// sender-side timestamp.
    pub fn connected() -> Self {
        let mut fields = Map::new();
        let _ = fields.insert("timestamp".to_string(), Value::String(crate::wire_timestamp()));
        Self::new(EventKind::Connected, fields)
    }

    /// The known kind, or `None` for a protocol extension this client does
    /// not recognize.
    pub fn known_kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.kind)
    }

    /// Encode into a JSON text frame.
    pub fn encode(&self) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame into an envelope.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut fields) = value else {
            return Err(DecodeError::NotObject);
        };
        let Some(kind_value) = fields.remove("type") else {
            return Err(DecodeError::MissingType);
        };
        let Value::String(kind) = kind_value else {
            return Err(DecodeError::TypeNotString);
        };
        Ok(Self { kind, fields })
    }

    /// The sender-set `timestamp` field, if present.
    ///
    /// Set at send time by the peer; the client must not assume it reflects
    /// receipt time.
    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get("timestamp").and_then(Value::as_str)
    }

    /// A payload field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize the payload fields into a typed contract.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}
