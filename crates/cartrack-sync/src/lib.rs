//! # cartrack-sync
//!
//! Real-time synchronization client for the Cartrack dashboard.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `client` | [`SyncClient`] façade: `connect`/`disconnect`/`on`/`off` |
//! | `session` | Connection state machine: open, reconnect, frame routing |
//! | `bus` | In-process publish/subscribe registry for decoded envelopes |
//! | `heartbeat` | Periodic ping/pong liveness probing |
//! | `transport` | `Connector` trait, channel-pair transport, WebSocket impl |
//! | `connection` | Connection state and per-transport health flag |
//! | `backoff` | Exponential reconnect backoff with jitter |
//! | `endpoint` | Identity → endpoint query-parameter resolution |
//! | `config` | Tunable intervals and thresholds |
//! | `errors` | Error types surfaced to callers |
//! | `logging` | Tracing subscriber setup for embedding applications |
//!
//! ## Data Flow
//!
//! `connect(endpoint, identity)` spawns one session task. The task owns the
//! physical transport exclusively: it decodes each inbound frame, intercepts
//! heartbeat traffic, and publishes everything else to the [`EventBus`] in
//! arrival order. On transport loss the task reconnects with backoff;
//! subscriber registrations live on the bus and survive every reconnect.

#![deny(unsafe_code)]

pub mod backoff;
pub mod bus;
pub mod client;
pub mod config;
pub mod connection;
pub mod endpoint;
pub mod errors;
pub mod heartbeat;
pub mod logging;
pub mod session;
pub mod transport;

pub use bus::{EventBus, SubscriptionHandle};
pub use client::{SyncClient, SyncStatus};
pub use config::SyncConfig;
pub use connection::ConnectionState;
pub use errors::SyncError;
pub use transport::{Connector, Transport, TransportEvent, WsConnector};
