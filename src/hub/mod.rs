//! Broadcast hub for viewer fan-out
//!
//! The hub owns the set of connected viewer sessions and delivers every
//! compressed chunk read from the transcoder to all of them.
//!
//! # Architecture
//!
//! ```text
//!                           Arc<BroadcastHub>
//!                     ┌──────────────────────────┐
//!                     │ sessions: HashMap<Id,    │
//!                     │   ViewerSession {        │
//!                     │     tx: mpsc::Sender,    │
//!                     │   }                      │
//!                     │ >                        │
//!                     └────────────┬─────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!   [forward task]           [connection]             [connection]
//!   source.read_chunk()      rx.recv()                rx.recv()
//!         │                        │                        │
//!         └──► hub.broadcast() ────┴──► ws.send() ──► TCP ──┘
//! ```
//!
//! Each session has a small bounded queue. `broadcast` waits at most
//! `send_timeout` for a session's queue to accept a chunk; a session that
//! cannot keep up is removed rather than slowing the others.
//!
//! # Zero-Copy Design
//!
//! Chunks are `bytes::Bytes`, so every session shares one allocation and
//! fan-out only bumps a reference count.

pub mod config;
pub mod session;
pub mod store;

pub use config::HubConfig;
pub use session::{SessionId, ViewerSession};
pub use store::BroadcastHub;
