//! Device transport for the hardware token.
//!
//! This module provides the byte-level link to the token:
//! - [`report`]: 64-byte HID report encoding and response classification
//! - [`hidraw`]: Unix HID device nodes (`/dev/hidrawN`)
//! - [`scripted`]: in-memory transport replaying canned responses

#[cfg(unix)]
pub mod hidraw;
pub mod report;
pub mod scripted;

use std::fmt;
use std::time::Duration;

use crate::error::{AgentError, Result};

/// Highest slot index a token exposes.
pub const MAX_SLOT_INDEX: u32 = 99;

/// Offset added to a slot index to form the on-device slot id.
pub const SLOT_ID_BASE: u8 = 100;

/// A trait representing an exclusively-owned link to the token.
///
/// Implementations move raw bytes only; message sequencing lives in
/// [`crate::signing`] and [`crate::session`].
pub trait DeviceTransport {
    /// Opens the link. Opening an already open transport is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Closes the link. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Sends one message addressed to `slot`.
    fn send(&mut self, opcode: Opcode, slot: Slot, payload: &[u8]) -> Result<()>;

    /// Reads up to `n` bytes of the next response, waiting at most `timeout`.
    ///
    /// Returns an empty vector when nothing arrived in time.
    fn read_bytes(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Reads the next response and returns it with trailing NUL padding
    /// removed. Returns an empty vector when nothing arrived in time.
    fn read_string(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Whether the link is currently open.
    fn is_open(&self) -> bool;
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for &mut T {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn send(&mut self, opcode: Opcode, slot: Slot, payload: &[u8]) -> Result<()> {
        (**self).send(opcode, slot, payload)
    }

    fn read_bytes(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_bytes(n, timeout)
    }

    fn read_string(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_string(timeout)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn send(&mut self, opcode: Opcode, slot: Slot, payload: &[u8]) -> Result<()> {
        (**self).send(opcode, slot, payload)
    }

    fn read_bytes(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_bytes(n, timeout)
    }

    fn read_string(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_string(timeout)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Message types understood by the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Request the public key stored in a slot.
    GetPublicKey = 236,
    /// Submit a challenge for signing.
    SignChallenge = 237,
}

impl Opcode {
    /// Wire value of the opcode.
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a wire value.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            236 => Some(Opcode::GetPublicKey),
            237 => Some(Opcode::SignChallenge),
            _ => None,
        }
    }
}

/// A key slot on the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(u8);

impl Slot {
    /// Slot for a user-facing index in `0..=99`.
    ///
    /// Index 1 is device slot id 101.
    pub fn from_index(index: u32) -> Result<Self> {
        if index > MAX_SLOT_INDEX {
            return Err(AgentError::InvalidSlot(index));
        }
        // Fits: 100 + 99 < 256
        Ok(Slot(SLOT_ID_BASE + index as u8))
    }

    /// The user-facing index.
    pub fn index(self) -> u32 {
        u32::from(self.0 - SLOT_ID_BASE)
    }

    /// The id sent on the wire.
    pub fn id(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.index(), self.0)
    }
}
