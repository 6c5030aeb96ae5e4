//! Connection state machine — one task per logical session.
//!
//! The session task exclusively owns the physical transport. It drives
//! `connecting → open → closed → connecting` with exponential backoff after
//! loss, and `open → closing → idle` on explicit disconnect. A reconnect
//! creates a new transport instance but the task, the bus, and the
//! subscriber set all survive it.
//!
//! Frame routing while open: decode → heartbeat frames mark the health flag
//! and stop there → known kinds publish to the bus → unknown kinds go to
//! the catch-all channel → malformed frames are logged and dropped, never
//! crashing the session or closing the connection.

use std::sync::Arc;
use std::time::Duration;

use cartrack_protocol::Envelope;
use tokio::sync::broadcast;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backoff::jittered_backoff_delay;
use crate::bus::EventBus;
use crate::client::SyncStatus;
use crate::config::SyncConfig;
use crate::connection::{ConnectionHealth, ConnectionState, StateCell};
use crate::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::transport::{Connector, Transport, TransportEvent};

/// Why one transport instance stopped serving.
#[derive(Debug, PartialEq, Eq)]
enum ServeOutcome {
    /// Transport error, close, or heartbeat timeout — reconnect.
    Lost,
    /// Explicit disconnect — terminal for the session.
    Disconnected,
}

/// Run one logical session until explicit disconnect.
///
/// Reconnects forever on transport loss; only cancellation of `cancel`
/// (the façade's `disconnect`) ends the session.
#[instrument(skip_all, fields(session_id = %session_id, url = %url))]
pub(crate) async fn run_session(
    session_id: String,
    connector: Arc<dyn Connector>,
    url: String,
    config: SyncConfig,
    bus: Arc<EventBus>,
    status_tx: broadcast::Sender<SyncStatus>,
    state: StateCell,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        state.set(ConnectionState::Connecting);
        let connected = tokio::select! {
            result = connector.connect(&url) => result,
            () = cancel.cancelled() => break,
        };

        match connected {
            Ok(transport) => {
                attempt = 0;
                let outcome =
                    serve_transport(transport, &config, &bus, &status_tx, &state, &cancel).await;
                if outcome == ServeOutcome::Disconnected {
                    break;
                }
                state.set(ConnectionState::Closed);
            }
            Err(e) => {
                warn!(error = %e, "connect attempt failed");
                state.set(ConnectionState::Closed);
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        let _ = status_tx.send(SyncStatus::Reconnecting);
        let delay = jittered_backoff_delay(
            attempt,
            config.backoff_base_ms,
            config.backoff_max_ms,
            config.backoff_jitter,
        );
        attempt = attempt.saturating_add(1);
        debug!(attempt, delay_ms = delay, "scheduling reconnect");
        tokio::select! {
            () = time::sleep(Duration::from_millis(delay)) => {}
            () = cancel.cancelled() => break,
        }
    }

    state.set(ConnectionState::Idle);
    let _ = status_tx.send(SyncStatus::Disconnected);
    info!("session ended");
}

/// Serve one open transport instance until it is lost or the session is
/// explicitly disconnected.
async fn serve_transport(
    transport: Transport,
    config: &SyncConfig,
    bus: &EventBus,
    status_tx: &broadcast::Sender<SyncStatus>,
    state: &StateCell,
    cancel: &CancellationToken,
) -> ServeOutcome {
    let Transport {
        outbound,
        mut inbound,
    } = transport;
    let transport_id = Uuid::now_v7();
    info!(%transport_id, "transport open");
    state.set(ConnectionState::Open);

    // `connected` strictly precedes every data event on this transport
    // instance: published before the first frame is read.
    bus.publish(&Envelope::connected());
    let _ = status_tx.send(SyncStatus::Connected);

    let health = Arc::new(ConnectionHealth::new());
    // Child token: cancelled with the session, and on every exit path below.
    let hb_cancel = cancel.child_token();
    let mut heartbeat = tokio::spawn(run_heartbeat(
        health.clone(),
        outbound.clone(),
        config.heartbeat_interval(),
        config.heartbeat_max_missed,
        hb_cancel.clone(),
    ));

    let outcome = loop {
        tokio::select! {
            event = inbound.recv() => match event {
                Some(TransportEvent::Frame(text)) => route_frame(&text, &health, bus),
                Some(TransportEvent::Closed) | None => {
                    info!(%transport_id, "transport closed by peer");
                    break ServeOutcome::Lost;
                }
                Some(TransportEvent::Failed(e)) => {
                    warn!(%transport_id, error = %e, "transport failed");
                    break ServeOutcome::Lost;
                }
            },
            result = &mut heartbeat => {
                match result {
                    Ok(HeartbeatResult::TimedOut) => {
                        warn!(%transport_id, "heartbeat timed out, dropping transport");
                    }
                    Ok(_) | Err(_) => {}
                }
                break ServeOutcome::Lost;
            }
            () = cancel.cancelled() => {
                state.set(ConnectionState::Closing);
                break ServeOutcome::Disconnected;
            }
        }
    };

    // No timer may fire after teardown, on any exit path.
    hb_cancel.cancel();
    outcome
}

/// Route one inbound frame.
fn route_frame(text: &str, health: &ConnectionHealth, bus: &EventBus) {
    match Envelope::decode(text) {
        Ok(envelope) => match envelope.known_kind() {
            // Pong (and any stray ping) is liveness evidence, never
            // delivered to subscribers.
            Some(kind) if kind.is_heartbeat() => health.mark_alive(),
            _ => bus.publish(&envelope),
        },
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
        }
    }
}
