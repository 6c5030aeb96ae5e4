//! Error types for the synchronization client.

use cartrack_protocol::{DecodeError, EventKind};
use thiserror::Error;

/// Errors surfaced by the synchronization client.
///
/// Transport-level failures are recovered internally via backoff reconnect
/// and reach the dashboard only as a status change; the variants here are
/// the ones a *caller* can see.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Establishing the physical transport failed.
    #[error("failed to connect: {context}")]
    Connect {
        /// What went wrong, transport-level detail included.
        context: String,
    },

    /// `disconnect` was called with no active session.
    #[error("no active session")]
    NotConnected,

    /// Subscribing to a heartbeat kind, which is connection plumbing and
    /// never delivered to subscribers.
    #[error("cannot subscribe to reserved heartbeat kind `{0}`")]
    ReservedKind(EventKind),

    /// Unsubscribing with a handle that is not registered.
    #[error("unknown subscription handle {0}")]
    UnknownSubscription(u64),

    /// A frame failed to decode. Internal diagnostics only — malformed
    /// frames are dropped, never raised to subscribers.
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),
}
