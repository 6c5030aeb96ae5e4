//! Physical transport plumbing.
//!
//! A [`Transport`] is a pair of channels wrapping one physical connection:
//! text frames out, [`TransportEvent`]s in. The session task owns it
//! exclusively — no other component ever holds a transport reference.
//!
//! [`Connector`] is the seam for tests: the production [`WsConnector`]
//! dials a WebSocket with `tokio-tungstenite`, while test doubles hand out
//! in-memory pairs from [`Transport::pair`]. Each pair is caller-owned with
//! an explicit lifecycle, so independent test sessions cannot
//! cross-contaminate through shared module state.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::errors::SyncError;

/// Per-transport channel capacity.
const CHANNEL_CAPACITY: usize = 64;

/// Something the transport observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived from the peer.
    Frame(String),
    /// The peer closed the connection (or the stream ended).
    Closed,
    /// The transport failed with an error.
    Failed(String),
}

/// One physical connection, viewed from the session task.
pub struct Transport {
    /// Outbound text frames toward the peer.
    pub outbound: mpsc::Sender<String>,
    /// Inbound events from the peer.
    pub inbound: mpsc::Receiver<TransportEvent>,
}

/// The far side of an in-memory [`Transport::pair`] — what a test double
/// "server" holds.
pub struct TransportHarness {
    /// Frames the client sent.
    pub sent: mpsc::Receiver<String>,
    /// Events to deliver to the client.
    pub push: mpsc::Sender<TransportEvent>,
}

impl Transport {
    /// Build an in-memory transport and its far side.
    ///
    /// Dropping the harness ends the transport: the client observes the
    /// inbound stream closing, which it treats as an abrupt close.
    pub fn pair() -> (Self, TransportHarness) {
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            TransportHarness {
                sent: out_rx,
                push: in_tx,
            },
        )
    }
}

/// Dials one physical transport.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a transport to `url`.
    ///
    /// Resolving successfully *is* the open acknowledgment — no explicit
    /// handshake frame precedes heartbeats.
    async fn connect(&self, url: &str) -> Result<Transport, SyncError>;
}

/// Production connector over `tokio-tungstenite`.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Transport, SyncError> {
        let (ws, _response) = connect_async(url).await.map_err(|e| SyncError::Connect {
            context: e.to_string(),
        })?;
        debug!(url, "websocket transport open");

        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
        drop(tokio::spawn(pump(ws, out_rx, in_tx)));

        Ok(Transport {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Shuttle frames between the WebSocket and the session's channels.
///
/// Exits when either side goes away; the session observes `Closed` or
/// `Failed` on the inbound channel and reacts from there.
async fn pump(
    ws: WsStream,
    mut out_rx: mpsc::Receiver<String>,
    in_tx: mpsc::Sender<TransportEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            frame = out_rx.recv() => {
                match frame {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            let _ = in_tx.send(TransportEvent::Failed("send failed".into())).await;
                            break;
                        }
                    }
                    // Session dropped its outbound handle: close gracefully.
                    None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(TransportEvent::Frame(text.to_string())).await.is_err() {
                            break;
                        }
                    }
                    // Some peers send text payloads in binary frames.
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(text) = std::str::from_utf8(&data) {
                            if in_tx.send(TransportEvent::Frame(text.to_string())).await.is_err() {
                                break;
                            }
                        } else {
                            debug!(len = data.len(), "dropping non-UTF8 binary frame");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = in_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                    // WebSocket-level ping/pong is handled by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = in_tx.send(TransportEvent::Failed(e.to_string())).await;
                        break;
                    }
                }
            }
        }
    }
}
