//! Line framer
//!
//! Buffers the raw inbound byte stream and yields one complete line per
//! `\n\r` terminator. Bytes after the last terminator stay buffered until
//! the rest of their line arrives.

use bytes::{Buf, BytesMut};

use crate::protocol::LINE_TERMINATOR;

/// Accumulates socket reads and splits them into protocol lines
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly received bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator
    ///
    /// Returns `None` until a full terminator has been buffered. Invalid
    /// UTF-8 is replaced rather than rejected; the protocol is UTF-8 and a
    /// malformed peer must not crash the framer.
    pub fn next_line(&mut self) -> Option<String> {
        let terminator = LINE_TERMINATOR.as_bytes();
        let position = self
            .buf
            .windows(terminator.len())
            .position(|window| window == terminator)?;

        let line = self.buf.split_to(position);
        self.buf.advance(terminator.len());

        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Bytes currently buffered without a complete terminator
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop any buffered partial line
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
