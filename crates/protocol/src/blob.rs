//! SSH user-authentication request blobs.
//!
//! When an SSH client asks an agent to sign a `publickey` login, the data to
//! be signed is the RFC 4252 section 7 structure:
//!
//! ```text
//! string    session identifier (nonce)
//! byte      SSH_MSG_USERAUTH_REQUEST (50)
//! string    user name
//! string    service name ("ssh-connection")
//! string    "publickey"
//! boolean   TRUE (has signature)
//! string    public key algorithm name
//! string    public key blob
//! ```
//!
//! [`decode_auth_blob`] reads exactly that sequence and nothing else. The
//! two single-byte markers are carried through but not checked; the caller
//! only routes signing requests here.

use crate::error::Result;
use crate::framing::{FrameReader, FrameWriter};
use crate::pubkey::{parse_public_key, PublicKeyRecord};

/// `SSH_MSG_USERAUTH_REQUEST`, the message-type marker a well-formed blob carries.
pub const SSH_MSG_USERAUTH_REQUEST: u8 = 50;

/// A decoded authentication request.
///
/// Built once per login attempt and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Session identifier from the key exchange.
    pub nonce: Vec<u8>,
    /// Message-type marker byte, as found on the wire.
    pub message_type: u8,
    /// Remote user name.
    pub user: String,
    /// Service (connection) identifier, normally `ssh-connection`.
    pub connection_id: String,
    /// Authentication method name, normally `publickey`.
    pub auth_method: String,
    /// "Has signature" marker byte, as found on the wire.
    pub has_signature: u8,
    /// Algorithm name the client announced for the key.
    pub key_type: String,
    /// The key the client is authenticating with.
    pub public_key: PublicKeyRecord,
}

impl AuthRequest {
    /// Whether the announced algorithm matches the embedded key's algorithm.
    pub fn key_type_matches(&self) -> bool {
        self.key_type == self.public_key.key_type().algorithm()
    }

    /// Re-encode in wire order. Decoding the result yields `self` again.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        let mut writer = FrameWriter::new();
        writer.put_frame(&self.nonce)?;
        writer.put_byte(self.message_type);
        writer.put_frame(self.user.as_bytes())?;
        writer.put_frame(self.connection_id.as_bytes())?;
        writer.put_frame(self.auth_method.as_bytes())?;
        writer.put_byte(self.has_signature);
        writer.put_frame(self.key_type.as_bytes())?;
        writer.put_frame(&self.public_key.to_blob())?;
        Ok(writer.into_bytes())
    }
}

/// Decode a raw authentication blob.
///
/// The order of the steps is the wire format; any reordering breaks
/// interoperability. Structural only: no signature or key checks beyond
/// what [`parse_public_key`] does.
pub fn decode_auth_blob(raw: &[u8]) -> Result<AuthRequest> {
    let mut reader = FrameReader::new(raw);

    // 1. session identifier
    let nonce = reader.read_frame()?.to_vec();
    // 2. SSH_MSG_USERAUTH_REQUEST, not validated
    let message_type = reader.read_byte()?;
    // 3-5. user, service, method
    let user = reader.read_text("user")?;
    let connection_id = reader.read_text("connection id")?;
    let auth_method = reader.read_text("auth method")?;
    // 6. has-signature boolean, not validated
    let has_signature = reader.read_byte()?;
    // 7. announced algorithm
    let key_type = reader.read_text("key type")?;
    // 8. public key blob
    let public_key = parse_public_key(reader.read_frame()?)?;
    // 9. nothing may follow
    reader.finish()?;

    Ok(AuthRequest {
        nonce,
        message_type,
        user,
        connection_id,
        auth_method,
        has_signature,
        key_type,
        public_key,
    })
}
