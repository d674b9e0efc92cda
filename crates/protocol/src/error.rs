//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering every way a blob or key can fail to decode.
///
/// None of these are recoverable for the blob that produced them: decoding
/// stops at the first error and the whole authentication attempt is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    // Framing errors
    /// The stream ended inside a frame header or payload.
    #[error("truncated stream: need {needed} bytes, have {available}")]
    TruncatedStream {
        /// Bytes required to finish the current read.
        needed: usize,
        /// Bytes actually left in the stream.
        available: usize,
    },

    /// Bytes were left over after the fixed decode sequence finished.
    #[error("trailing data: {remaining} unconsumed bytes after decode")]
    TrailingData {
        /// Number of bytes that were not consumed.
        remaining: usize,
    },

    /// Payload is too large to be described by a 4-byte length prefix.
    #[error("frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Actual payload size.
        size: usize,
        /// Maximum encodable size.
        max: usize,
    },

    /// A text field did not contain valid UTF-8.
    #[error("invalid text in field '{field}'")]
    InvalidText {
        /// Name of the offending field.
        field: &'static str,
    },

    // Key errors
    /// Algorithm identifier is not one this crate understands.
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Key material is malformed for its declared algorithm.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
