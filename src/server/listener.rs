//! Streaming listener
//!
//! Accepts viewer TCP connections, upgrades them to WebSocket, registers a
//! session with the hub and pumps the session's queue into the socket.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_tungstenite::tungstenite::Message;

use crate::hub::BroadcastHub;
use crate::server::config::ServerConfig;

/// WebSocket server feeding viewers from the hub
pub struct StreamServer {
    hub: Arc<BroadcastHub>,
    tcp_nodelay: bool,
    handshake_timeout: Duration,
    write_timeout: Duration,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl StreamServer {
    /// Create a server delivering `hub`'s stream
    pub fn new(config: &ServerConfig, hub: Arc<BroadcastHub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            hub,
            tcp_nodelay: config.tcp_nodelay,
            handshake_timeout: config.handshake_timeout,
            write_timeout: config.write_timeout,
            connection_semaphore,
        }
    }

    /// Accept connections on `listener` until `shutdown` resolves
    ///
    /// Connections already accepted keep running until the hub closes their
    /// session or the viewer goes away.
    pub async fn run_until<F>(&self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, "Stream server listening");
        }

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Stream listener stopping");
            }
            _ = self.accept_loop(&listener) => {}
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        if self.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(peer = %peer_addr, error = %e, "Failed to configure socket");
                return;
            }
        }

        tracing::debug!(peer = %peer_addr, "New connection");

        let hub = Arc::clone(&self.hub);
        let handshake_timeout = self.handshake_timeout;
        let write_timeout = self.write_timeout;

        tokio::spawn(async move {
            serve_viewer(socket, peer_addr, hub, handshake_timeout, write_timeout, permit).await;
            tracing::debug!(peer = %peer_addr, "Connection closed");
        });
    }
}

async fn serve_viewer(
    socket: TcpStream,
    peer_addr: SocketAddr,
    hub: Arc<BroadcastHub>,
    handshake_timeout: Duration,
    write_timeout: Duration,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let ws = match tokio::time::timeout(handshake_timeout, tokio_tungstenite::accept_async(socket)).await
    {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            tracing::debug!(peer = %peer_addr, error = %e, "WebSocket upgrade failed");
            return;
        }
        Err(_) => {
            tracing::debug!(peer = %peer_addr, "WebSocket upgrade timed out");
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (session, mut queue) = hub.session(Some(peer_addr));

    let session_id = match hub.register(session).await {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(peer = %peer_addr, error = %e, "Session not registered");
            let _ = tokio::time::timeout(write_timeout, ws_tx.send(Message::Close(None))).await;
            return;
        }
    };

    loop {
        tokio::select! {
            chunk = queue.recv() => match chunk {
                Some(data) => {
                    let sent = tokio::time::timeout(write_timeout, ws_tx.send(Message::Binary(data))).await;
                    if !matches!(sent, Ok(Ok(()))) {
                        tracing::debug!(session_id = session_id, "Viewer write failed");
                        break;
                    }
                }
                None => {
                    // Dropped by the hub (shutdown or too slow)
                    let _ = tokio::time::timeout(write_timeout, ws_tx.send(Message::Close(None))).await;
                    break;
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(session_id = session_id, "Viewer closed connection");
                    break;
                }
                Some(Err(e)) => {
                    tracing::debug!(session_id = session_id, error = %e, "Viewer read error");
                    break;
                }
                // Viewers have nothing to say; pings are answered by tungstenite
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unregister(session_id).await;
}
