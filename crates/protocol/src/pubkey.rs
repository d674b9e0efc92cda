//! SSH public-key blobs: parsing, fingerprints and OpenSSH export.
//!
//! A public-key blob is itself a short frame sequence:
//!
//! ```text
//! ssh-ed25519:          string "ssh-ed25519"          string key[32]
//! ecdsa-sha2-nistp256:  string "ecdsa-sha2-nistp256"  string "nistp256"  string Q[65]
//! ```

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ProtocolError, Result};
use crate::framing::{FrameReader, FrameWriter};

/// Length of an Ed25519 public key.
pub const ED25519_KEY_LENGTH: usize = 32;

/// Length of an uncompressed SEC1 point on NIST P-256.
pub const NISTP256_POINT_LENGTH: usize = 65;

/// Length of a key fingerprint (SHA-256 output).
pub const FINGERPRINT_LENGTH: usize = 32;

/// Public-key algorithms understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// `ssh-ed25519`
    Ed25519,
    /// `ecdsa-sha2-nistp256`
    #[serde(rename = "nistp256")]
    EcdsaNistp256,
}

impl KeyType {
    /// SSH algorithm identifier for this key type.
    pub const fn algorithm(self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ssh-ed25519",
            KeyType::EcdsaNistp256 => "ecdsa-sha2-nistp256",
        }
    }

    /// Curve identifier carried inside ECDSA blobs.
    const fn curve_name(self) -> Option<&'static str> {
        match self {
            KeyType::Ed25519 => None,
            KeyType::EcdsaNistp256 => Some("nistp256"),
        }
    }

    /// Look up a key type by its SSH algorithm identifier.
    pub fn from_algorithm(name: &str) -> Result<Self> {
        match name {
            "ssh-ed25519" => Ok(KeyType::Ed25519),
            "ecdsa-sha2-nistp256" => Ok(KeyType::EcdsaNistp256),
            other => Err(ProtocolError::UnsupportedKeyType(other.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm())
    }
}

impl FromStr for KeyType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_algorithm(s)
    }
}

/// SHA-256 digest of a public-key blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LENGTH]);

impl Fingerprint {
    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LENGTH] {
        &self.0
    }

    /// Lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Formats as `SHA256:<unpadded base64>`, the way `ssh-keygen -l` prints it.
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHA256:{}", STANDARD_NO_PAD.encode(self.0))
    }
}

/// A decoded public key: algorithm plus algorithm-specific key material.
///
/// Immutable once constructed. The fingerprint is recomputed on demand
/// from the canonical encoding rather than stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKeyRecord {
    key_type: KeyType,
    key_material: Vec<u8>,
}

impl PublicKeyRecord {
    /// Build a record after checking the material length fits the algorithm.
    ///
    /// Ed25519 keys must be 32 bytes and P-256 points 65 bytes. The bytes
    /// themselves are not inspected; see [`PublicKeyRecord::validate`].
    pub fn new(key_type: KeyType, key_material: Vec<u8>) -> Result<Self> {
        let expected = match key_type {
            KeyType::Ed25519 => ED25519_KEY_LENGTH,
            KeyType::EcdsaNistp256 => NISTP256_POINT_LENGTH,
        };
        if key_material.len() != expected {
            return Err(ProtocolError::InvalidPublicKey(format!(
                "{} key must be {} bytes, got {}",
                key_type,
                expected,
                key_material.len()
            )));
        }

        Ok(Self {
            key_type,
            key_material,
        })
    }

    /// Check that the key material is a usable point.
    ///
    /// Ed25519 keys must decompress to a curve point. P-256 points must be
    /// in uncompressed form (leading `0x04`).
    pub fn validate(&self) -> Result<()> {
        match self.key_type {
            KeyType::Ed25519 => {
                let mut bytes = [0u8; ED25519_KEY_LENGTH];
                bytes.copy_from_slice(&self.key_material);
                ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| ProtocolError::InvalidPublicKey(e.to_string()))?;
            }
            KeyType::EcdsaNistp256 => {
                if self.key_material.first() != Some(&0x04) {
                    return Err(ProtocolError::InvalidPublicKey(
                        "nistp256 point is not in uncompressed form".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Convenience constructor for an Ed25519 key.
    pub fn ed25519(key: [u8; ED25519_KEY_LENGTH]) -> Result<Self> {
        Self::new(KeyType::Ed25519, key.to_vec())
    }

    /// The key's algorithm.
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Raw key material (Ed25519 key bytes or SEC1 point).
    pub fn key_material(&self) -> &[u8] {
        &self.key_material
    }

    /// Canonical SSH wire encoding of this key.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut writer = FrameWriter::with_capacity(64 + self.key_material.len());
        // Field lengths are fixed by construction, far below the frame limit.
        let _ = writer.put_frame(self.key_type.algorithm().as_bytes());
        if let Some(curve) = self.key_type.curve_name() {
            let _ = writer.put_frame(curve.as_bytes());
        }
        let _ = writer.put_frame(&self.key_material);
        writer.into_bytes()
    }

    /// SHA-256 over the canonical encoding.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut digest = [0u8; FINGERPRINT_LENGTH];
        digest.copy_from_slice(&Sha256::digest(self.to_blob()));
        Fingerprint(digest)
    }

    /// One `authorized_keys` line: `<algorithm> <base64 blob> <label>`.
    pub fn to_openssh(&self, label: &str) -> String {
        let encoded = STANDARD.encode(self.to_blob());
        if label.is_empty() {
            format!("{} {}", self.key_type.algorithm(), encoded)
        } else {
            format!("{} {} {}", self.key_type.algorithm(), encoded, label)
        }
    }
}

/// Decode a public-key blob (the payload of one frame).
///
/// Only the structure is checked: algorithm, curve name and key length.
/// Unknown algorithm identifiers fail with
/// [`ProtocolError::UnsupportedKeyType`]. Bytes left after the
/// algorithm's sub-fields fail with [`ProtocolError::TrailingData`].
pub fn parse_public_key(frame: &[u8]) -> Result<PublicKeyRecord> {
    let mut reader = FrameReader::new(frame);
    let algorithm = reader.read_text("key algorithm")?;
    let key_type = KeyType::from_algorithm(&algorithm)?;

    if let Some(expected) = key_type.curve_name() {
        let curve = reader.read_text("curve name")?;
        if curve != expected {
            return Err(ProtocolError::InvalidPublicKey(format!(
                "curve {} does not match algorithm {}",
                curve, algorithm
            )));
        }
    }

    let material = reader.read_frame()?.to_vec();
    reader.finish()?;

    PublicKeyRecord::new(key_type, material)
}
