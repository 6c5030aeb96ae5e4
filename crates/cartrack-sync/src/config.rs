//! Synchronization client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default heartbeat probe interval in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Default number of consecutive missed pongs tolerated before the
/// connection is declared dead.
pub const DEFAULT_HEARTBEAT_MAX_MISSED: u32 = 2;
/// Default reconnect backoff base delay in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;
/// Default reconnect backoff cap in milliseconds.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
/// Default backoff jitter factor (0.0–1.0).
pub const DEFAULT_BACKOFF_JITTER: f64 = 0.2;

/// Tunable intervals and thresholds for a synchronization session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Interval between heartbeat pings in ms (default: 30000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Consecutive missed pongs before reconnect (default: 2).
    #[serde(default = "default_heartbeat_max_missed")]
    pub heartbeat_max_missed: u32,
    /// Base delay for reconnect backoff in ms (default: 1000).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Maximum delay between reconnect attempts in ms (default: 30000).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Jitter factor 0.0–1.0 (default: 0.2).
    #[serde(default = "default_backoff_jitter")]
    pub backoff_jitter: f64,
}

fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}
fn default_heartbeat_max_missed() -> u32 {
    DEFAULT_HEARTBEAT_MAX_MISSED
}
fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}
fn default_backoff_max_ms() -> u64 {
    DEFAULT_BACKOFF_MAX_MS
}
fn default_backoff_jitter() -> f64 {
    DEFAULT_BACKOFF_JITTER
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            heartbeat_max_missed: DEFAULT_HEARTBEAT_MAX_MISSED,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            backoff_jitter: DEFAULT_BACKOFF_JITTER,
        }
    }
}

impl SyncConfig {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.heartbeat_max_missed, 2);
        assert_eq!(config.backoff_base_ms, 1000);
        assert_eq!(config.backoff_max_ms, 30_000);
        assert!((config.backoff_jitter - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn config_serde_defaults_from_empty() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.backoff_max_ms, 30_000);
    }

    #[test]
    fn config_serde_partial_override() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"heartbeatIntervalMs": 5000}"#).unwrap();
        assert_eq!(config.heartbeat_interval_ms, 5000);
        assert_eq!(config.heartbeat_max_missed, 2);
    }

    #[test]
    fn heartbeat_interval_duration() {
        let config = SyncConfig {
            heartbeat_interval_ms: 250,
            ..SyncConfig::default()
        };
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(250));
    }
}
