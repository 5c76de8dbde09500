//! Streaming wire protocol
//!
//! A viewer connection carries WebSocket binary messages only:
//!
//! ```text
//! Server                                   Viewer
//!   |------- handshake (8 bytes) ---------->|
//!   |------- chunk ------------------------>|
//!   |------- chunk ------------------------>|
//!   |                 ...                   |
//! ```
//!
//! Chunks are opaque slices of the transcoder's output and carry no framing
//! of their own.

pub mod constants;
pub mod handshake;

pub use handshake::StreamHandshake;
