//! Protocol constants

/// Magic token that opens every stream
pub const STREAM_MAGIC: [u8; 4] = *b"jsmp";

/// Handshake length: magic + width (u16 BE) + height (u16 BE)
pub const HANDSHAKE_LEN: usize = 8;

/// Read size used when pulling compressed output from the transcoder
pub const DEFAULT_READ_CHUNK_SIZE: usize = 512;

/// Default HTTP port for the viewer page
pub const DEFAULT_HTTP_PORT: u16 = 8082;

/// Default port for the streaming (WebSocket) listener
pub const DEFAULT_STREAM_PORT: u16 = 8084;

/// Path of the client script served next to the viewer page
pub const CLIENT_SCRIPT_PATH: &str = "/jsmpg.js";
