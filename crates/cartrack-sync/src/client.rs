//! Synchronization client façade.
//!
//! [`SyncClient`] is the one surface a dashboard binary talks to. It owns
//! the event bus, the session task, and a broadcast channel of coarse
//! [`SyncStatus`] changes, and hides transports, heartbeats, and the
//! reconnect loop entirely.

use std::sync::Arc;

use cartrack_protocol::{Envelope, EventKind};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::{EventBus, SubscriptionHandle};
use crate::config::SyncConfig;
use crate::connection::{ConnectionState, StateCell};
use crate::endpoint::resolve_endpoint;
use crate::errors::SyncError;
use crate::session::run_session;
use crate::transport::{Connector, WsConnector};

/// Coarse lifecycle notifications for UI chrome ("live" / "reconnecting"
/// badges). Data events flow through subscriptions, not here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    /// A transport is open and `connected` has been delivered.
    Connected,
    /// The transport was lost; a reconnect is scheduled.
    Reconnecting,
    /// The session ended by explicit disconnect.
    Disconnected,
}

/// Capacity of the status broadcast channel. Status changes are rare;
/// a lagging receiver only ever misses intermediate transitions.
const STATUS_CAPACITY: usize = 16;

struct ActiveSession {
    endpoint: String,
    identity: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handle to one logical synchronization session.
pub struct SyncClient {
    config: SyncConfig,
    connector: Arc<dyn Connector>,
    bus: Arc<EventBus>,
    status_tx: broadcast::Sender<SyncStatus>,
    state: StateCell,
    session: Mutex<Option<ActiveSession>>,
}

impl SyncClient {
    /// New client dialing real WebSocket endpoints.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// New client with a caller-supplied [`Connector`], for tests and
    /// alternative transports.
    pub fn with_connector(config: SyncConfig, connector: Arc<dyn Connector>) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CAPACITY);
        Self {
            config,
            connector,
            bus: Arc::new(EventBus::new()),
            status_tx,
            state: StateCell::new(),
            session: Mutex::new(None),
        }
    }

    /// Start (or confirm) a session against `endpoint` as `identity`.
    ///
    /// Idempotent: a second call with the same endpoint and identity while
    /// a session is live is a no-op. Different parameters tear the old
    /// session down first, waiting until it has fully stopped.
    pub async fn connect(&self, endpoint: &str, identity: &str) -> Result<(), SyncError> {
        // Teardown-and-insert loop: a new session is only installed under a
        // lock acquisition that observed the slot empty. A concurrent
        // connect that filled the slot while we awaited teardown is itself
        // taken and torn down on the next iteration, never overwritten with
        // its cancel token still live.
        loop {
            let previous = {
                let mut session = self.session.lock();
                let is_same = session.as_ref().is_some_and(|active| {
                    active.endpoint == endpoint
                        && active.identity == identity
                        && !active.handle.is_finished()
                });
                if is_same {
                    debug!(endpoint, identity, "connect is a no-op, session already live");
                    return Ok(());
                }
                match session.take() {
                    Some(previous) => previous,
                    None => {
                        *session = Some(self.spawn_session(endpoint, identity));
                        return Ok(());
                    }
                }
            };
            Self::teardown(previous).await;
        }
    }

    fn spawn_session(&self, endpoint: &str, identity: &str) -> ActiveSession {
        let url = resolve_endpoint(endpoint, identity);
        let session_id = format!("sess_{}", Uuid::now_v7());
        info!(%session_id, endpoint, identity, "starting session");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_session(
            session_id,
            self.connector.clone(),
            url,
            self.config.clone(),
            self.bus.clone(),
            self.status_tx.clone(),
            self.state.clone(),
            cancel.clone(),
        ));
        ActiveSession {
            endpoint: endpoint.to_owned(),
            identity: identity.to_owned(),
            cancel,
            handle,
        }
    }

    /// End the session: close the transport, stop the heartbeat, cancel
    /// any pending reconnect. Subscriptions are kept and fire again after
    /// a later `connect`.
    pub async fn disconnect(&self) -> Result<(), SyncError> {
        let active = self.session.lock().take().ok_or(SyncError::NotConnected)?;
        Self::teardown(active).await;
        Ok(())
    }

    async fn teardown(active: ActiveSession) {
        active.cancel.cancel();
        let _ = active.handle.await;
    }

    /// Subscribe a handler to one event kind.
    pub fn on(
        &self,
        kind: EventKind,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, SyncError> {
        self.bus.subscribe(kind, handler)
    }

    /// Subscribe a catch-all handler for unrecognized event types.
    pub fn on_unhandled(
        &self,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.bus.subscribe_unhandled(handler)
    }

    /// Remove a subscription.
    pub fn off(&self, handle: SubscriptionHandle) -> Result<(), SyncError> {
        self.bus.unsubscribe(handle)
    }

    /// Receiver for coarse status changes.
    pub fn subscribe_status(&self) -> broadcast::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Some(active) = self.session.lock().take() {
            active.cancel.cancel();
        }
    }
}
