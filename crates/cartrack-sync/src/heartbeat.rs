//! Heartbeat ping/pong liveness monitoring.
//!
//! Detects the half-open case an ordinary close event never reports: the
//! transport still looks open but the peer has stopped responding. The
//! monitor runs under a child cancellation token owned by the session task
//! and is cancelled on every path out of the open state, so no tick fires
//! after teardown.

use std::sync::Arc;
use std::time::Duration;

use cartrack_protocol::{Envelope, EventKind};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::ConnectionHealth;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The peer stopped answering pings; treat as an abrupt transport close.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
    /// The outbound channel closed underneath the monitor.
    TransportClosed,
}

/// Run heartbeat probing for one transport instance.
///
/// At each `interval` tick: if a pong arrived since the last tick, a fresh
/// `ping` is sent and the miss counter resets; otherwise the counter
/// increments. Once more than `max_missed` consecutive ticks pass without a
/// pong the peer is considered dead and `TimedOut` is returned.
///
/// The first tick fires immediately, sending the initial ping — transport
/// open counts as liveness evidence for it.
pub async fn run_heartbeat(
    health: Arc<ConnectionHealth>,
    outbound: mpsc::Sender<String>,
    interval: Duration,
    max_missed: u32,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let ping = Envelope::bare(EventKind::Ping)
        .encode()
        .unwrap_or_else(|_| String::from(r#"{"type":"ping"}"#));
    let mut tick = time::interval(interval);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if health.check_alive() {
                    missed = 0;
                    if outbound.send(ping.clone()).await.is_err() {
                        return HeartbeatResult::TransportClosed;
                    }
                } else {
                    missed += 1;
                    debug!(missed, max_missed, "heartbeat tick without pong");
                    if missed > max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_health() -> Arc<ConnectionHealth> {
        Arc::new(ConnectionHealth::new())
    }

    #[tokio::test]
    async fn first_tick_sends_ping() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(run_heartbeat(
            make_health(),
            tx,
            Duration::from_secs(60),
            2,
            cancel2,
        ));

        let frame = rx.recv().await.unwrap();
        let env = Envelope::decode(&frame).unwrap();
        assert_eq!(env.known_kind(), Some(EventKind::Ping));

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_immediately() {
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(run_heartbeat(
            make_health(),
            tx,
            Duration::from_secs(100),
            2,
            cancel2,
        ));

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_max_missed_exceeded() {
        let health = make_health();
        // Consume the initial liveness so every tick is a miss.
        let _ = health.check_alive();
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let result = run_heartbeat(health, tx, Duration::from_millis(100), 2, cancel).await;
        assert_eq!(result, HeartbeatResult::TimedOut);
    }

    #[tokio::test]
    async fn stays_alive_while_pongs_arrive() {
        let health = make_health();
        let health2 = health.clone();
        let (tx, mut rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(run_heartbeat(
            health2,
            tx,
            Duration::from_millis(20),
            1,
            cancel2,
        ));

        // Answer several pings, then cancel — it must not have timed out.
        for _ in 0..4 {
            let _ = rx.recv().await.unwrap();
            health.mark_alive();
        }
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_single_miss() {
        let health = make_health();
        let health2 = health.clone();
        let (tx, mut rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(run_heartbeat(
            health2,
            tx,
            Duration::from_millis(100),
            2,
            cancel2,
        ));

        // First ping goes out; let one tick miss, then answer.
        let _ = rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        health.mark_alive();
        // Next tick sends a fresh ping, proving the counter reset.
        let _ = rx.recv().await.unwrap();

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test]
    async fn closed_outbound_reports_transport_closed() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let cancel = CancellationToken::new();
        let result = run_heartbeat(
            make_health(),
            tx,
            Duration::from_millis(10),
            2,
            cancel,
        )
        .await;
        assert_eq!(result, HeartbeatResult::TransportClosed);
    }

    #[test]
    fn heartbeat_result_equality() {
        assert_eq!(HeartbeatResult::TimedOut, HeartbeatResult::TimedOut);
        assert_ne!(HeartbeatResult::TimedOut, HeartbeatResult::Cancelled);
    }
}
