//! Connection state and per-transport health tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// State of the connection state machine.
///
/// Exactly one state machine is alive per logical session; a reconnect
/// creates a new physical transport but preserves the machine identity and
/// the subscriber set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session, or the previous session ended by explicit disconnect.
    Idle,
    /// A transport is being established.
    Connecting,
    /// A transport is open and frames are flowing.
    Open,
    /// Explicit disconnect in progress.
    Closing,
    /// The transport was lost; a reconnect is pending.
    Closed,
}

/// Shared, observable connection state slot.
///
/// Written by the session task, read by the façade.
#[derive(Clone, Debug)]
pub struct StateCell(Arc<Mutex<ConnectionState>>);

impl StateCell {
    /// Create a cell starting in [`ConnectionState::Idle`].
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(ConnectionState::Idle)))
    }

    /// Current state.
    pub fn get(&self) -> ConnectionState {
        *self.0.lock()
    }

    /// Transition to a new state.
    pub fn set(&self, state: ConnectionState) {
        *self.0.lock() = state;
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Liveness flag for one physical transport instance.
///
/// The session task calls [`mark_alive`](Self::mark_alive) when a `pong`
/// arrives; the heartbeat monitor calls [`check_alive`](Self::check_alive)
/// each tick, which reads and resets the flag.
pub struct ConnectionHealth {
    /// Whether the peer has responded since the last heartbeat tick.
    is_alive: AtomicBool,
    /// When the last pong (or transport open) was observed.
    last_pong: Mutex<Instant>,
}

impl ConnectionHealth {
    /// Create a health tracker for a freshly opened transport.
    ///
    /// Starts alive: the transport open itself is evidence of liveness.
    pub fn new() -> Self {
        Self {
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(Instant::now()),
        }
    }

    /// Record a pong from the peer.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the peer responded since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last pong (or transport open).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_starts_idle() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Idle);
    }

    #[test]
    fn state_cell_transitions() {
        let cell = StateCell::new();
        cell.set(ConnectionState::Connecting);
        assert_eq!(cell.get(), ConnectionState::Connecting);
        cell.set(ConnectionState::Open);
        assert_eq!(cell.get(), ConnectionState::Open);
    }

    #[test]
    fn state_cell_clones_share_storage() {
        let cell = StateCell::new();
        let view = cell.clone();
        cell.set(ConnectionState::Closed);
        assert_eq!(view.get(), ConnectionState::Closed);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
    }

    #[test]
    fn health_starts_alive() {
        let health = ConnectionHealth::new();
        assert!(health.check_alive());
        // Flag resets after the check
        assert!(!health.check_alive());
    }

    #[test]
    fn mark_alive_sets_flag_again() {
        let health = ConnectionHealth::new();
        let _ = health.check_alive();
        assert!(!health.check_alive());
        health.mark_alive();
        assert!(health.check_alive());
    }

    #[test]
    fn last_pong_elapsed_increases() {
        let health = ConnectionHealth::new();
        let first = health.last_pong_elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert!(health.last_pong_elapsed() > first);
    }
}
