//! [`BroadcastServer`] – WebSocket fan-out of event envelopes.
//!
//! Listens on `localhost:8765` by default (configurable via
//! [`BroadcastServer::with_host`] / [`BroadcastServer::with_port`]).
//!
//! * Every accepted WebSocket becomes a subscriber in the shared
//!   [`SubscriberRegistry`] until it closes.
//! * [`BroadcastServer::broadcast`] serializes an envelope once and sends it
//!   to all subscribers concurrently; a subscriber whose send fails is
//!   pruned without affecting the others.
//! * Subscribers are not expected to send anything.  Inbound messages are
//!   read (so closes are noticed) and discarded.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use les02_types::{EventEnvelope, Les02Error};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

use crate::registry::{SubscriberHandle, SubscriberRegistry, SubscriberSink};

/// Default bind host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP port for the WebSocket endpoint.
pub const DEFAULT_PORT: u16 = 8765;

/// Lifecycle of one subscriber connection.
///
/// `Connecting → Connected → Disconnecting → Closed`.  The handle is only a
/// registry member while `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP accepted, WebSocket handshake in progress.
    Connecting,
    /// Handshake done and registered; receiving broadcasts.
    Connected,
    /// Closed by the peer, failed, or pruned after a failed send.
    Disconnecting,
    /// Deregistered; the handle is discarded.
    Closed,
}

impl ConnectionState {
    fn advance(self, next: ConnectionState, peer: SocketAddr) -> ConnectionState {
        trace!(peer = %peer, from = ?self, to = ?next, "connection state");
        next
    }
}

// ---------------------------------------------------------------------------
// WebSocket sink
// ---------------------------------------------------------------------------

type WsWriter = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Write half of an accepted WebSocket.
struct WsSink {
    tx: Mutex<WsWriter>,
}

#[async_trait]
impl SubscriberSink for WsSink {
    async fn send_text(&self, text: &str) -> Result<(), Les02Error> {
        self.tx
            .lock()
            .await
            .send(Message::Text(text.to_owned().into()))
            .await
            .map_err(|e| Les02Error::Delivery(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// BroadcastServer
// ---------------------------------------------------------------------------

/// WebSocket server that pushes every envelope to every connected subscriber.
///
/// Cloning is cheap; all clones share one [`SubscriberRegistry`].
///
/// # Example
///
/// ```rust,no_run
/// use les02_middleware::BroadcastServer;
///
/// #[tokio::main]
/// async fn main() {
///     BroadcastServer::new()
///         .with_port(8765)
///         .start()
///         .await
///         .expect("broadcast server failed");
/// }
/// ```
#[derive(Clone, Debug)]
pub struct BroadcastServer {
    registry: Arc<SubscriberRegistry>,
    host: String,
    port: u16,
}

impl BroadcastServer {
    /// Create a server on [`DEFAULT_HOST`]:[`DEFAULT_PORT`] with an empty
    /// registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }

    /// Override the bind host (builder-style).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Register a freshly connected subscriber.  Returns the member count.
    pub fn on_connect(&self, handle: SubscriberHandle) -> usize {
        let peer = handle.peer();
        let count = self.registry.add(handle);
        info!(peer = ?peer, subscribers = count, "subscriber connected");
        count
    }

    /// Deregister a subscriber.  Idempotent.  Returns the member count.
    pub fn on_disconnect(&self, handle: &SubscriberHandle) -> usize {
        let count = self.registry.remove(handle);
        info!(peer = ?handle.peer(), subscribers = count, "subscriber disconnected");
        count
    }

    /// Send `envelope` to every current subscriber.
    ///
    /// Takes a registry snapshot first; with no subscribers it returns
    /// without serializing anything.  Deliveries run concurrently and
    /// independently.  Any subscriber whose delivery fails is removed from
    /// the registry.  Always completes once every delivery has been
    /// attempted; individual outcomes are not reported.
    pub async fn broadcast(&self, envelope: &EventEnvelope) {
        let targets = self.registry.snapshot();
        if targets.is_empty() {
            return;
        }

        let text = match serde_json::to_string(envelope) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "envelope serialization failed");
                return;
            }
        };
        let text = text.as_str();

        let outcomes = join_all(
            targets
                .iter()
                .map(|target| async move { (target, target.send(text).await) }),
        )
        .await;

        for (target, outcome) in outcomes {
            if let Err(e) = outcome {
                let count = self.registry.remove(target);
                warn!(
                    peer = ?target.peer(),
                    error = %e,
                    subscribers = count,
                    "delivery failed; subscriber removed"
                );
            }
        }
    }

    /// Bind the listening socket on the configured host and port.
    ///
    /// # Errors
    ///
    /// Returns [`Les02Error::Bind`] if the address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener, Les02Error> {
        TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| Les02Error::Bind {
                addr: format!("{}:{}", self.host, self.port),
                details: e.to_string(),
            })
    }

    /// Bind and accept subscribers until the process ends.
    ///
    /// # Errors
    ///
    /// Returns [`Les02Error::Bind`] if the listener cannot bind.  Once bound
    /// the server never returns.
    pub async fn start(self) -> Result<(), Les02Error> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Accept connections on an already bound listener, forever.
    ///
    /// Each connection is handled on its own task.  Accept errors are logged
    /// and the loop continues.
    pub async fn serve(self, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!(addr = %addr, "broadcast server listening on ws://{addr}"),
            Err(e) => warn!(error = %e, "broadcast server listening on unknown address"),
        }

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, peer).await {
                            debug!(peer = %peer, error = %e, "subscriber connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), Les02Error> {
        let state = ConnectionState::Connecting;
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| Les02Error::Connection(format!("handshake from {peer}: {e}")))?;

        let (ws_tx, mut ws_rx) = ws_stream.split();
        let handle = SubscriberHandle::new(Arc::new(WsSink {
            tx: Mutex::new(ws_tx),
        }))
        .with_peer(peer);

        self.on_connect(handle.clone());
        let state = state.advance(ConnectionState::Connected, peer);

        // Hold the connection open; inbound traffic is ignored.
        let result = loop {
            match ws_rx.next().await {
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                Some(Err(e)) => break Err(Les02Error::Connection(format!("{peer}: {e}"))),
                Some(Ok(_)) => {}
            }
        };

        let state = state.advance(ConnectionState::Disconnecting, peer);
        self.on_disconnect(&handle);
        state.advance(ConnectionState::Closed, peer);
        result
    }
}

impl Default for BroadcastServer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
