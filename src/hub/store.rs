//! Broadcast hub implementation
//!
//! Holds the active session set and fans compressed chunks out to it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::future::join_all;
use tokio::sync::{mpsc, Mutex};

use super::config::HubConfig;
use super::session::{SessionId, ViewerSession};
use crate::error::HubError;
use crate::protocol::StreamHandshake;
use crate::stats::{HubCounters, HubStats};

struct SessionSet {
    sessions: HashMap<SessionId, ViewerSession>,
    closed: bool,
}

/// Fan-out point between the transcoder and the viewers
///
/// The session set is the only state shared between the accept loop
/// (registers), the forward task (broadcasts and drops) and the orchestrator
/// (shutdown). It is never locked across a send.
pub struct BroadcastHub {
    handshake: Bytes,
    config: HubConfig,
    set: Mutex<SessionSet>,
    next_session_id: AtomicU64,
    counters: HubCounters,
}

impl BroadcastHub {
    /// Create a hub that greets sessions with `handshake`
    pub fn new(handshake: StreamHandshake) -> Self {
        Self::with_config(handshake, HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(handshake: StreamHandshake, config: HubConfig) -> Self {
        Self {
            handshake: handshake.encode(),
            config,
            set: Mutex::new(SessionSet {
                sessions: HashMap::new(),
                closed: false,
            }),
            next_session_id: AtomicU64::new(1),
            counters: HubCounters::default(),
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Create a session sized by this hub's queue configuration
    pub fn session(&self, peer_addr: Option<std::net::SocketAddr>) -> (ViewerSession, mpsc::Receiver<Bytes>) {
        ViewerSession::channel(self.config.session_queue, peer_addr)
    }

    /// Register a session
    ///
    /// Sends the handshake first; the session joins the active set only if
    /// that succeeds, so the handshake always precedes the first chunk it
    /// sees. A session whose handshake fails is discarded.
    pub async fn register(&self, session: ViewerSession) -> Result<SessionId, HubError> {
        if self.set.lock().await.closed {
            return Err(HubError::Closed);
        }

        let sent = tokio::time::timeout(
            self.config.send_timeout,
            session.tx.send(self.handshake.clone()),
        )
        .await;

        if !matches!(sent, Ok(Ok(()))) {
            self.counters.record_handshake_failed();
            tracing::debug!(peer = ?session.peer_addr(), "Handshake failed, session discarded");
            return Err(HubError::HandshakeFailed);
        }

        let mut set = self.set.lock().await;
        if set.closed {
            return Err(HubError::Closed);
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let peer = session.peer_addr();
        set.sessions.insert(session_id, session);
        self.counters.record_registered();

        tracing::info!(
            session_id = session_id,
            peer = ?peer,
            sessions = set.sessions.len(),
            "Viewer registered"
        );

        Ok(session_id)
    }

    /// Remove a session (viewer closed the connection)
    ///
    /// Returns false if it was already gone.
    pub async fn unregister(&self, session_id: SessionId) -> bool {
        let mut set = self.set.lock().await;
        let removed = set.sessions.remove(&session_id).is_some();

        if removed {
            tracing::debug!(
                session_id = session_id,
                sessions = set.sessions.len(),
                "Viewer unregistered"
            );
        }

        removed
    }

    /// Send a chunk to every active session
    ///
    /// Sessions are served concurrently, each bounded by `send_timeout`.
    /// Sessions whose send fails or times out are removed. Returns the
    /// number of sessions that accepted the chunk.
    pub async fn broadcast(&self, chunk: Bytes) -> usize {
        let targets: Vec<(SessionId, mpsc::Sender<Bytes>)> = {
            let mut set = self.set.lock().await;
            if set.closed {
                return 0;
            }

            // Viewers that already went away are dropped without a send
            let counters = &self.counters;
            set.sessions.retain(|id, session| {
                if session.is_closed() {
                    counters.record_dropped();
                    tracing::debug!(session_id = *id, "Viewer gone, dropped before send");
                    false
                } else {
                    true
                }
            });

            set.sessions
                .iter()
                .map(|(id, session)| (*id, session.tx.clone()))
                .collect()
        };

        self.counters.record_broadcast(chunk.len());

        if targets.is_empty() {
            return 0;
        }

        let timeout = self.config.send_timeout;
        let results = join_all(targets.iter().map(|(id, tx)| {
            let chunk = chunk.clone();
            async move {
                let delivered = matches!(
                    tokio::time::timeout(timeout, tx.send(chunk)).await,
                    Ok(Ok(()))
                );
                (*id, delivered)
            }
        }))
        .await;

        let failed: Vec<SessionId> = results
            .iter()
            .filter(|(_, delivered)| !delivered)
            .map(|(id, _)| *id)
            .collect();

        if !failed.is_empty() {
            let mut set = self.set.lock().await;
            for id in &failed {
                if set.sessions.remove(id).is_some() {
                    self.counters.record_dropped();
                    tracing::warn!(
                        session_id = *id,
                        sessions = set.sessions.len(),
                        "Viewer dropped: send failed or timed out"
                    );
                }
            }
        }

        results.len() - failed.len()
    }

    /// Stop accepting sessions and close all active ones
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut set = self.set.lock().await;
        if set.closed {
            return;
        }

        set.closed = true;
        let closed = set.sessions.len();
        set.sessions.clear();

        tracing::info!(sessions = closed, "Broadcast hub shut down");
    }

    /// Whether `shutdown` has run
    pub async fn is_closed(&self) -> bool {
        self.set.lock().await.closed
    }

    /// Number of active sessions
    pub async fn session_count(&self) -> usize {
        self.set.lock().await.sessions.len()
    }

    /// Get hub statistics
    pub async fn stats(&self) -> HubStats {
        let active = self.session_count().await;
        self.counters.snapshot(active)
    }
}
