//! Challenge-response signing with the token.
//!
//! One signing call walks a small state machine:
//!
//! ```text
//! Idle ──send──▶ ChallengeSent ──user acks──▶ Polling{n} ──signature──▶ Done
//!                                               │   ▲
//!                                       pending │   │ n - 1
//!                                               ▼   │
//!                                     device error ─┴─▶ Failed
//!                                     n == 0 ─────────▶ TimedOut
//! ```
//!
//! The wait for the user has no deadline but honours the cancellation token.
//! Polling is bounded by `max_attempts` reads of at most `poll_timeout` each.

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use protocol::{derive_code, ConfirmationCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::report::{classify, Response, SIGNATURE_LENGTH};
use crate::device::{DeviceTransport, Opcode, Slot};
use crate::error::{AgentError, Result};
use crate::prompt::{ConfirmationRequest, Confirmer};

/// Default number of polls before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Default wait per poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(250);

/// Bounds for the polling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningPolicy {
    /// Polls before the request times out.
    pub max_attempts: u32,
    /// Longest wait for each poll.
    pub poll_timeout: Duration,
}

impl SigningPolicy {
    /// Upper bound on time spent polling.
    pub fn worst_case(&self) -> Duration {
        self.poll_timeout * self.max_attempts
    }
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// A raw signature as returned by the token.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    /// Wraps raw signature bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Standard padded base64 encoding.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

/// What to sign and who it is for.
#[derive(Debug, Clone, Copy)]
pub struct Challenge<'a> {
    /// Key slot to sign with.
    pub slot: Slot,
    /// Raw bytes sent to the token.
    pub blob: &'a [u8],
    /// Remote user shown in the prompt.
    pub user: &'a str,
    /// Host shown in the prompt, may be empty.
    pub host: &'a str,
}

/// Where a signing session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningState {
    /// Nothing sent yet.
    Idle,
    /// Challenge delivered; waiting for the user.
    ChallengeSent,
    /// Waiting for the signature.
    Polling {
        /// Polls left.
        remaining: u32,
    },
    /// Signature received.
    Done(Signature),
    /// The token reported an error.
    Failed(String),
    /// Polls exhausted.
    TimedOut,
}

impl SigningState {
    /// Whether no further transitions happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SigningState::Done(_) | SigningState::Failed(_) | SigningState::TimedOut
        )
    }
}

/// State of one signing call.
#[derive(Debug)]
pub struct SigningSession<'a> {
    challenge: Challenge<'a>,
    code: ConfirmationCode,
    policy: SigningPolicy,
    state: SigningState,
}

impl<'a> SigningSession<'a> {
    /// Starts a session in [`SigningState::Idle`].
    pub fn new(challenge: Challenge<'a>, policy: SigningPolicy) -> Self {
        Self {
            code: derive_code(challenge.blob),
            challenge,
            policy,
            state: SigningState::Idle,
        }
    }

    /// Code the user must enter on the token.
    pub fn code(&self) -> ConfirmationCode {
        self.code
    }

    /// Current state.
    pub fn state(&self) -> &SigningState {
        &self.state
    }

    /// Advances one transition. A no-op in a terminal state.
    pub fn step<T, C>(
        &mut self,
        transport: &mut T,
        confirmer: &mut C,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: DeviceTransport + ?Sized,
        C: Confirmer + ?Sized,
    {
        self.state = match self.state {
            SigningState::Idle => {
                debug!(
                    slot = %self.challenge.slot,
                    bytes = self.challenge.blob.len(),
                    "sending challenge"
                );
                transport.send(
                    Opcode::SignChallenge,
                    self.challenge.slot,
                    self.challenge.blob,
                )?;
                SigningState::ChallengeSent
            }
            SigningState::ChallengeSent => {
                info!(code = %self.code, user = self.challenge.user, "awaiting confirmation on token");
                let request = ConfirmationRequest {
                    code: self.code,
                    user: self.challenge.user,
                    host: self.challenge.host,
                };
                confirmer.confirm(&request, cancel)?;
                SigningState::Polling {
                    remaining: self.policy.max_attempts,
                }
            }
            SigningState::Polling { remaining: 0 } => SigningState::TimedOut,
            SigningState::Polling { remaining } => {
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                let response = transport.read_bytes(SIGNATURE_LENGTH, self.policy.poll_timeout)?;
                match classify(&response) {
                    Response::Signature(bytes) => SigningState::Done(Signature(bytes)),
                    Response::DeviceError(message) => {
                        warn!(%message, "token rejected challenge");
                        SigningState::Failed(message)
                    }
                    Response::Pending => {
                        debug!(remaining = remaining - 1, len = response.len(), "no signature yet");
                        SigningState::Polling {
                            remaining: remaining - 1,
                        }
                    }
                }
            }
            SigningState::Done(_) | SigningState::Failed(_) | SigningState::TimedOut => {
                return Ok(())
            }
        };
        Ok(())
    }

    /// Steps to a terminal state and returns its outcome.
    pub fn run<T, C>(
        mut self,
        transport: &mut T,
        confirmer: &mut C,
        cancel: &CancellationToken,
    ) -> Result<Signature>
    where
        T: DeviceTransport + ?Sized,
        C: Confirmer + ?Sized,
    {
        while !self.state.is_terminal() {
            self.step(transport, confirmer, cancel)?;
        }

        match self.state {
            SigningState::Done(signature) => {
                debug!("signature received");
                Ok(signature)
            }
            SigningState::Failed(message) => Err(AgentError::Device(message)),
            _ => Err(AgentError::SigningTimeout {
                attempts: self.policy.max_attempts,
            }),
        }
    }
}

/// Runs a complete signing exchange.
pub fn sign_challenge<T, C>(
    transport: &mut T,
    challenge: Challenge<'_>,
    confirmer: &mut C,
    cancel: &CancellationToken,
    policy: SigningPolicy,
) -> Result<Signature>
where
    T: DeviceTransport + ?Sized,
    C: Confirmer + ?Sized,
{
    SigningSession::new(challenge, policy).run(transport, confirmer, cancel)
}
