//! Out-of-band user acknowledgment of the confirmation code.
//!
//! Waiting on a human has no deadline, but it is always cancellable: every
//! [`Confirmer`] receives a [`CancellationToken`] and must return
//! [`AgentError::Cancelled`] promptly once it fires.

#[cfg(unix)]
use std::fs::File;
#[cfg(unix)]
use std::io::{self, ErrorKind, Read, Stderr, Write};
#[cfg(unix)]
use std::os::fd::AsFd;
use std::time::Duration;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use protocol::ConfirmationCode;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AgentError, Result};

/// What the user is asked to approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationRequest<'a> {
    /// Code to enter on the token.
    pub code: ConfirmationCode,
    /// Remote user the login is for.
    pub user: &'a str,
    /// Host label of the identity, possibly empty.
    pub host: &'a str,
}

/// Presents a confirmation code and waits for the user.
pub trait Confirmer {
    /// Blocks until the user acknowledges `request` or `cancel` fires.
    fn confirm(
        &mut self,
        request: &ConfirmationRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

impl<F> Confirmer for F
where
    F: FnMut(&ConfirmationRequest<'_>, &CancellationToken) -> Result<()>,
{
    fn confirm(
        &mut self,
        request: &ConfirmationRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self(request, cancel)
    }
}

/// How often a waiting [`TerminalConfirmer`] checks for cancellation.
pub const DEFAULT_CANCEL_POLL: Duration = Duration::from_millis(100);

/// Prints the code and waits for a line on the input.
///
/// The wait happens on the calling thread: the input descriptor is polled
/// every `cancel_poll` and the token is checked in between, so a cancelled
/// wait leaves unread input for the next prompt.
#[cfg(unix)]
pub struct TerminalConfirmer<R, W> {
    input: R,
    output: W,
    cancel_poll: Duration,
}

#[cfg(unix)]
impl TerminalConfirmer<File, Stderr> {
    /// Confirmer reading stdin and writing to stderr.
    ///
    /// Stdin is read through a duplicated descriptor, bypassing the standard
    /// library's buffer that `poll` cannot see into.
    pub fn stdio() -> io::Result<Self> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::new(File::from(fd), io::stderr()))
    }
}

#[cfg(unix)]
impl<R, W> TerminalConfirmer<R, W>
where
    R: Read + AsFd,
    W: Write,
{
    /// Confirmer over arbitrary input and output streams.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            cancel_poll: DEFAULT_CANCEL_POLL,
        }
    }

    /// Changes how often cancellation is checked.
    pub fn with_cancel_poll(mut self, interval: Duration) -> Self {
        self.cancel_poll = interval;
        self
    }

    /// The output stream.
    pub fn output(&self) -> &W {
        &self.output
    }

    fn show(&mut self, request: &ConfirmationRequest<'_>) -> io::Result<()> {
        if request.host.is_empty() {
            writeln!(
                self.output,
                "Enter the 3 digit challenge code on the token to authorize {} login.",
                request.user
            )?;
        } else {
            writeln!(
                self.output,
                "Enter the 3 digit challenge code on the token to authorize {}@{} login.",
                request.user, request.host
            )?;
        }
        writeln!(self.output, "{}", request.code)?;
        writeln!(self.output, "Press ENTER once the code has been entered.")?;
        self.output.flush()
    }

    /// Waits up to `cancel_poll` for input. Hang-up counts as readable.
    fn input_ready(&self) -> Result<bool> {
        let mut fds = [PollFd::new(self.input.as_fd(), PollFlags::POLLIN)];
        let millis = u16::try_from(self.cancel_poll.as_millis()).unwrap_or(u16::MAX);
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(n) => Ok(n > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(errno) => Err(AgentError::Transport(errno.into())),
        }
    }
}

#[cfg(unix)]
impl<R, W> Confirmer for TerminalConfirmer<R, W>
where
    R: Read + AsFd,
    W: Write,
{
    fn confirm(
        &mut self,
        request: &ConfirmationRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        self.show(request)?;

        let mut buf = [0u8; 64];
        loop {
            if cancel.is_cancelled() {
                debug!("acknowledgment wait cancelled");
                return Err(AgentError::Cancelled);
            }
            if !self.input_ready()? {
                continue;
            }
            match self.input.read(&mut buf) {
                Ok(0) => {
                    debug!("input closed before acknowledgment");
                    return Err(AgentError::Cancelled);
                }
                Ok(n) if buf[..n].contains(&b'\n') => return Ok(()),
                Ok(_) => {}
                Err(e)
                    if e.kind() == ErrorKind::Interrupted || e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}
