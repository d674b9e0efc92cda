//! Error types for the agent crate.

use protocol::ProtocolError;
use thiserror::Error;

/// Agent error type covering device, protocol and signing failures.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The authentication blob or a key could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // Signing errors
    /// The device never produced a signature within the polling budget.
    #[error("signing timed out: no signature after {attempts} attempts")]
    SigningTimeout {
        /// Number of poll attempts made.
        attempts: u32,
    },

    /// The device reported an explicit failure.
    #[error("device error: {0}")]
    Device(String),

    /// User acknowledgment was cancelled by the application.
    #[error("confirmation cancelled")]
    Cancelled,

    // Transport errors
    /// Reading from or writing to the device failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The transport was used before `open` or after `close`.
    #[error("device is not open")]
    NotOpen,

    /// The device answered with a response of the wrong size.
    #[error("unexpected response: expected {expected} bytes, got {got}")]
    UnexpectedResponse {
        /// Expected response length.
        expected: usize,
        /// Actual response length.
        got: usize,
    },

    /// Key slot index outside the device's range.
    #[error("invalid slot {0}: must be between 0 and 99")]
    InvalidSlot(u32),
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
