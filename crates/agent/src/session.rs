//! Exclusive device session.
//!
//! A [`DeviceSession`] owns the transport for its whole lifetime: it opens
//! the link and drains stale messages when created, and closes the link when
//! dropped, whichever way the caller leaves. Only one operation can run at a
//! time because every operation takes `&mut self`.

use std::time::Duration;

use protocol::{decode_auth_blob, Identity, KeyType, PublicKeyRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::report::device_text;
use crate::device::{DeviceTransport, Opcode, Slot};
use crate::error::{AgentError, Result};
use crate::prompt::Confirmer;
use crate::signing::{sign_challenge, Challenge, Signature, SigningPolicy};

/// Upper bound on stale messages discarded when a session starts.
pub const MAX_DRAIN_READS: usize = 16;

/// Session timing and key selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Wait per read while draining stale messages.
    pub drain_timeout: Duration,
    /// Wait for the public key after requesting it.
    pub public_key_timeout: Duration,
    /// Curve of the keys stored on the token.
    pub key_type: KeyType,
    /// Polling bounds for signing.
    pub signing: SigningPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_millis(50),
            public_key_timeout: Duration::from_millis(1000),
            key_type: KeyType::Ed25519,
            signing: SigningPolicy::default(),
        }
    }
}

/// An open, exclusively owned connection to the token.
#[derive(Debug)]
pub struct DeviceSession<T: DeviceTransport> {
    transport: T,
    settings: SessionSettings,
}

impl<T: DeviceTransport> DeviceSession<T> {
    /// Opens `transport` and discards anything the token queued earlier.
    pub fn open(mut transport: T, settings: SessionSettings) -> Result<Self> {
        transport.open()?;
        let mut session = Self {
            transport,
            settings,
        };
        session.drain()?;
        Ok(session)
    }

    /// Settings in effect.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn drain(&mut self) -> Result<()> {
        for _ in 0..MAX_DRAIN_READS {
            let stale = self.transport.read_string(self.settings.drain_timeout)?;
            if stale.is_empty() {
                return Ok(());
            }
            debug!(bytes = stale.len(), "discarded stale device message");
        }
        warn!("token kept sending data while draining");
        Ok(())
    }

    /// Fetches the public key stored in `slot`.
    pub fn public_key(&mut self, slot: Slot, key_type: KeyType) -> Result<PublicKeyRecord> {
        self.transport.send(Opcode::GetPublicKey, slot, &[])?;

        let expected = match key_type {
            KeyType::Ed25519 => protocol::ED25519_KEY_LENGTH,
            // The token returns the bare X || Y coordinates.
            KeyType::EcdsaNistp256 => protocol::NISTP256_POINT_LENGTH - 1,
        };
        let bytes = self
            .transport
            .read_bytes(expected, self.settings.public_key_timeout)?;

        if let Some(text) = device_text(&bytes) {
            return Err(AgentError::Device(text.to_string()));
        }
        if bytes.len() != expected {
            return Err(AgentError::UnexpectedResponse {
                expected,
                got: bytes.len(),
            });
        }

        let material = match key_type {
            KeyType::Ed25519 => bytes,
            KeyType::EcdsaNistp256 => {
                let mut point = Vec::with_capacity(protocol::NISTP256_POINT_LENGTH);
                point.push(0x04);
                point.extend_from_slice(&bytes);
                point
            }
        };
        let key = PublicKeyRecord::new(key_type, material)?;
        key.validate()?;
        debug!(%slot, fingerprint = %key.fingerprint(), "fetched public key");
        Ok(key)
    }

    /// Public key for `identity` in OpenSSH `authorized_keys` form.
    pub fn export_public_key(&mut self, identity: &Identity) -> Result<String> {
        let slot = Slot::from_index(identity.index)?;
        let key = self.public_key(slot, self.settings.key_type)?;
        Ok(key.to_openssh(&identity.to_string()))
    }

    /// Decodes `blob`, asks the user to confirm, and has the token sign it.
    pub fn sign_ssh_challenge<C>(
        &mut self,
        identity: &Identity,
        blob: &[u8],
        confirmer: &mut C,
        cancel: &CancellationToken,
    ) -> Result<Signature>
    where
        C: Confirmer + ?Sized,
    {
        let request = decode_auth_blob(blob)?;
        debug!(nonce = %hex::encode(&request.nonce), "nonce");
        debug!(
            user = %request.user,
            connection = %request.connection_id,
            method = %request.auth_method,
            key_type = %request.key_type,
            fingerprint = %request.public_key.fingerprint(),
            "decoded authentication request"
        );
        if !request.key_type_matches() {
            warn!(
                announced = %request.key_type,
                actual = request.public_key.key_type().algorithm(),
                "key type does not match embedded public key"
            );
        }

        let slot = Slot::from_index(identity.index)?;
        info!(
            "please confirm user {} login to {} using the token",
            request.user, identity
        );
        let challenge = Challenge {
            slot,
            blob,
            user: &request.user,
            host: &identity.host,
        };
        sign_challenge(
            &mut self.transport,
            challenge,
            confirmer,
            cancel,
            self.settings.signing,
        )
    }

    /// Closes the link now, reporting any error.
    pub fn close(mut self) -> Result<()> {
        self.transport.close()
    }
}

impl<T: DeviceTransport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        if self.transport.is_open() {
            if let Err(e) = self.transport.close() {
                warn!(error = %e, "failed to close token");
            }
        }
    }
}
