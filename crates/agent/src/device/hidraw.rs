//! Token access through a Linux/BSD `hidraw` device node.
//!
//! Reports are written and read whole, one `write`/`read` per report. Read
//! timeouts use `poll(2)` so a silent token never blocks the caller longer
//! than asked.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, trace};

use super::report::{encode_message, REPORT_SIZE};
use super::{DeviceTransport, Opcode, Slot};
use crate::error::{AgentError, Result};

/// HID transport over a device node such as `/dev/hidraw0`.
#[derive(Debug)]
pub struct HidrawTransport {
    path: PathBuf,
    file: Option<File>,
}

impl HidrawTransport {
    /// Creates a closed transport for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// The device node this transport talks to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(AgentError::NotOpen)
    }

    /// Reads one report, or `None` when `timeout` passes first.
    fn read_report(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let file = self.file()?;

        let ready = {
            let mut fds = [PollFd::new(file.as_fd(), PollFlags::POLLIN)];
            let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(n) => n > 0,
                Err(Errno::EINTR) => false,
                Err(errno) => return Err(AgentError::Transport(errno.into())),
            }
        };
        if !ready {
            return Ok(None);
        }

        let mut buf = [0u8; REPORT_SIZE];
        match file.read(&mut buf) {
            Ok(n) => {
                trace!(bytes = n, "read report");
                Ok(Some(buf[..n].to_vec()))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl DeviceTransport for HidrawTransport {
    fn open(&mut self) -> Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
            debug!(path = %self.path.display(), "opened token");
            self.file = Some(file);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "closed token");
        }
        Ok(())
    }

    fn send(&mut self, opcode: Opcode, slot: Slot, payload: &[u8]) -> Result<()> {
        let reports = encode_message(opcode, slot.id(), payload);
        let file = self.file()?;
        for report in &reports {
            // hidraw expects the report number first; the token uses 0.
            let mut packet = [0u8; REPORT_SIZE + 1];
            packet[1..].copy_from_slice(report);
            file.write_all(&packet)?;
        }
        debug!(?opcode, slot = slot.id(), reports = reports.len(), "sent message");
        Ok(())
    }

    fn read_bytes(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut bytes = Vec::with_capacity(n);

        while bytes.len() < n {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.read_report(remaining)? {
                Some(report) => bytes.extend_from_slice(&report),
                None => break,
            }
            if remaining.is_zero() {
                break;
            }
        }

        bytes.truncate(n);
        Ok(bytes)
    }

    fn read_string(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let mut bytes = self.read_report(timeout)?.unwrap_or_default();
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        bytes.truncate(end);
        Ok(bytes)
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_closed() {
        let transport = HidrawTransport::new("/dev/hidraw0");
        assert!(!transport.is_open());
        assert_eq!(transport.path(), Path::new("/dev/hidraw0"));
    }

    #[test]
    fn test_open_missing_node_fails() {
        let mut transport = HidrawTransport::new("/nonexistent/hidraw-test-node");
        assert!(matches!(transport.open(), Err(AgentError::Transport(_))));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_use_before_open() {
        let mut transport = HidrawTransport::new("/dev/hidraw0");
        assert!(matches!(
            transport.read_string(Duration::from_millis(1)),
            Err(AgentError::NotOpen)
        ));
        assert!(matches!(
            transport.send(Opcode::GetPublicKey, Slot::from_index(1).unwrap(), &[]),
            Err(AgentError::NotOpen)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut transport = HidrawTransport::new("/dev/hidraw0");
        transport.close().unwrap();
        transport.close().unwrap();
    }

    #[test]
    fn test_read_times_out_on_silent_node() {
        // A socket nobody writes to behaves like a silent token.
        let (reader, _peer) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut transport = HidrawTransport::new("socket");
        transport.file = Some(File::from(std::os::fd::OwnedFd::from(reader)));

        let start = Instant::now();
        let bytes = transport.read_bytes(32, Duration::from_millis(20)).unwrap();
        assert!(bytes.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
