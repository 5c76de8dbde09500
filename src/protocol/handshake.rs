//! Stream handshake
//!
//! Every viewer receives one fixed header before any video data:
//!
//! ```text
//! +------+------+------+------+----------+----------+
//! | 'j'  | 's'  | 'm'  | 'p'  | width BE | height BE|
//! +------+------+------+------+----------+----------+
//!   0      1      2      3      4..6       6..8
//! ```
//!
//! The decoder on the viewer side sizes its canvas from these two fields.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::{HANDSHAKE_LEN, STREAM_MAGIC};

/// Fixed header sent to each newly registered session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandshake {
    /// Frame width in pixels
    pub width: u16,
    /// Frame height in pixels
    pub height: u16,
}

impl StreamHandshake {
    /// Create a handshake for the given resolution
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Encode to the 8-byte wire form
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_slice(&STREAM_MAGIC);
        buf.put_u16(self.width);
        buf.put_u16(self.height);
        buf.freeze()
    }

    /// Parse a handshake
    ///
    /// Returns `None` if the buffer is too short or the magic does not match.
    /// Trailing bytes are ignored.
    pub fn decode(mut data: &[u8]) -> Option<Self> {
        if data.len() < HANDSHAKE_LEN || data[..4] != STREAM_MAGIC {
            return None;
        }

        data.advance(4);
        let width = data.get_u16();
        let height = data.get_u16();

        Some(Self { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_vga() {
        let handshake = StreamHandshake::new(640, 480);
        let bytes = handshake.encode();

        assert_eq!(bytes.len(), HANDSHAKE_LEN);
        assert_eq!(&bytes[..], b"jsmp\x02\x80\x01\xe0");
    }

    #[test]
    fn test_decode() {
        let parsed = StreamHandshake::decode(b"jsmp\x05\x00\x02\xd0").unwrap();

        assert_eq!(parsed, StreamHandshake::new(1280, 720));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        assert!(StreamHandshake::decode(b"mpeg\x02\x80\x01\xe0").is_none());
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        assert!(StreamHandshake::decode(b"jsmp\x02\x80").is_none());
        assert!(StreamHandshake::decode(&[]).is_none());
    }

    #[test]
    fn test_max_dimensions() {
        let handshake = StreamHandshake::new(u16::MAX, u16::MAX);
        let bytes = handshake.encode();

        assert_eq!(&bytes[4..], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(StreamHandshake::decode(&bytes), Some(handshake));
    }
}
