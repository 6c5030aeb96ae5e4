//! Event kind enumeration.
//!
//! [`EventKind`] enumerates every event type the Cartrack real-time channel
//! knows about. The serialized strings are the wire contract — the dashboard
//! front-end and the server both match on them, so they must not change.

use serde::{Deserialize, Serialize};

/// Known event kinds on the real-time channel.
///
/// Each variant serializes to its snake_case wire string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Session established (synthesized client-side on transport open).
    #[serde(rename = "connected")]
    Connected,
    /// Heartbeat probe (client → server).
    #[serde(rename = "ping")]
    Ping,
    /// Heartbeat reply (server → client).
    #[serde(rename = "pong")]
    Pong,
    /// A tracked package car changed state.
    #[serde(rename = "car_updated")]
    CarUpdated,
    /// A new shift began.
    #[serde(rename = "shift_started")]
    ShiftStarted,
    /// The presence count changed.
    #[serde(rename = "active_users_updated")]
    ActiveUsersUpdated,
}

/// All event kind variants, for exhaustive testing.
pub const ALL_EVENT_KINDS: &[EventKind] = &[
    EventKind::Connected,
    EventKind::Ping,
    EventKind::Pong,
    EventKind::CarUpdated,
    EventKind::ShiftStarted,
    EventKind::ActiveUsersUpdated,
];

impl EventKind {
    /// The exact wire string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::CarUpdated => "car_updated",
            Self::ShiftStarted => "shift_started",
            Self::ActiveUsersUpdated => "active_users_updated",
        }
    }

    /// Parse a wire string into a known kind.
    ///
    /// Returns `None` for unknown strings — the caller decides whether that
    /// is an error or a catch-all routing case.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "connected" => Some(Self::Connected),
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            "car_updated" => Some(Self::CarUpdated),
            "shift_started" => Some(Self::ShiftStarted),
            "active_users_updated" => Some(Self::ActiveUsersUpdated),
            _ => None,
        }
    }

    /// Whether this kind is heartbeat traffic (`ping`/`pong`).
    ///
    /// Heartbeat frames are connection plumbing and are never delivered to
    /// dashboard subscribers.
    pub fn is_heartbeat(self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
