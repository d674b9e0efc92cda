//! Length-prefixed frame reader and writer.
//!
//! # Frame Format
//!
//! Each frame consists of:
//! - 4 bytes: payload length `n` (big-endian, unsigned)
//! - `n` bytes: payload
//!
//! This is the SSH `string` encoding from RFC 4251. Auth blobs and public-key
//! blobs are sequences of such frames, occasionally interleaved with single
//! marker bytes, so the reader also exposes byte-level reads.
//!
//! A declared length must be fully backed by the stream. A short read is a
//! [`ProtocolError::TruncatedStream`], never a short result.

use crate::error::{ProtocolError, Result};

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload a 4-byte length prefix can describe.
pub const MAX_FRAME_SIZE: usize = u32::MAX as usize;

/// Cursor over a byte buffer that decodes frames one after another.
///
/// The reader borrows the buffer, so decoded payloads are slices into it and
/// no copying happens until a caller asks for owned data.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Read one length-prefixed frame and return its payload.
    ///
    /// Advances past the header and the payload. Fails with
    /// [`ProtocolError::TruncatedStream`] if fewer than 4 header bytes or
    /// fewer than `n` payload bytes remain; in that case the cursor is left
    /// where it was.
    pub fn read_frame(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let header = self.take(LENGTH_PREFIX_SIZE)?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;

        match self.take(len) {
            Ok(payload) => Ok(payload),
            Err(err) => {
                self.pos = start;
                Err(err)
            }
        }
    }

    /// Read one frame and decode it as UTF-8 text.
    ///
    /// `field` names the value in the error if the bytes are not UTF-8.
    pub fn read_text(&mut self, field: &'static str) -> Result<String> {
        let bytes = self.read_frame()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidText { field })
    }

    /// Read a single raw byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the whole buffer has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume the reader, failing if any bytes are left over.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(ProtocolError::TrailingData { remaining }),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(ProtocolError::TruncatedStream {
                needed: n,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

/// Encode `payload` as a single length-prefixed frame.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let mut writer = FrameWriter::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    writer.put_frame(payload)?;
    Ok(writer.into_bytes())
}

/// Builder for byte sequences made of frames and marker bytes.
#[derive(Debug, Clone, Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append a length-prefixed frame.
    pub fn put_frame(&mut self, payload: &[u8]) -> Result<&mut Self> {
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        self.buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(payload);
        Ok(self)
    }

    /// Append a single raw byte.
    pub fn put_byte(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Finish writing and return the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
