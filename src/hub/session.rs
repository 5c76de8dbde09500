//! Viewer session handle

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

/// Identifier assigned by the hub at registration
pub type SessionId = u64;

/// One open streaming connection, as seen by the hub
///
/// The hub only holds the sending half of the session's queue. Whoever
/// created the session drains the receiver into the actual socket, so
/// dropping the session (on send failure, removal or hub shutdown) ends that
/// writer.
#[derive(Debug)]
pub struct ViewerSession {
    pub(super) tx: mpsc::Sender<Bytes>,
    peer_addr: Option<SocketAddr>,
}

impl ViewerSession {
    /// Create a session and the receiver its writer drains
    pub fn channel(capacity: usize, peer_addr: Option<SocketAddr>) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let session = Self {
            tx,
            peer_addr,
        };

        (session, rx)
    }

    /// Remote address, when backed by a socket
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Whether the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
