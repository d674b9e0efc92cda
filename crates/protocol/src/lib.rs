//! # TokenSSH Protocol Library
//!
//! Pure decoding for the TokenSSH agent: no device I/O and no global state.
//!
//! ## Overview
//!
//! An SSH client that wants to log in with a hardware-held key hands the
//! agent an authentication-request blob. This crate turns that blob into
//! structured data and derives what the user needs to approve it:
//!
//! - **Framing**: big-endian length-prefixed fields (SSH `string`)
//! - **Public Keys**: `ssh-ed25519` / `ecdsa-sha2-nistp256` blobs, fingerprints, OpenSSH export
//! - **Auth Blobs**: the fixed RFC 4252 `publickey` signing payload
//! - **Confirmation Codes**: three digits sampled from the blob's SHA-256
//! - **Identities**: permissive `proto://user@host:port/path` decomposition
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │      Auth Blob Decoder   │   │  Confirmation Code       │
//! ├────────────┬─────────────┤   └──────────────────────────┘
//! │            │ Public Key  │   ┌──────────────────────────┐
//! │            │ Parser      │   │  Identity Parser         │
//! ├────────────┴─────────────┤   └──────────────────────────┘
//! │        Frame Reader      │
//! └──────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{decode_auth_blob, derive_code, AuthRequest, PublicKeyRecord};
//!
//! let key = [
//!     0xd7, 0x5a, 0x98, 0x01, 0x82, 0xb1, 0x0a, 0xb7, 0xd5, 0x4b, 0xfe, 0xd3, 0xc9, 0x64,
//!     0x07, 0x3a, 0x0e, 0xe1, 0x72, 0xf3, 0xda, 0xa6, 0x23, 0x25, 0xaf, 0x02, 0x1a, 0x68,
//!     0xf7, 0x07, 0x51, 0x1a,
//! ];
//! let request = AuthRequest {
//!     nonce: vec![7; 32],
//!     message_type: protocol::SSH_MSG_USERAUTH_REQUEST,
//!     user: "alice".into(),
//!     connection_id: "ssh-connection".into(),
//!     auth_method: "publickey".into(),
//!     has_signature: 1,
//!     key_type: "ssh-ed25519".into(),
//!     public_key: PublicKeyRecord::ed25519(key).unwrap(),
//! };
//! let blob = request.to_blob().unwrap();
//!
//! let decoded = decode_auth_blob(&blob).unwrap();
//! assert_eq!(decoded.user, "alice");
//! println!("confirm {} on the token", derive_code(&blob));
//! ```
//!
//! ## Modules
//!
//! - [`framing`]: Frame reader and writer
//! - [`pubkey`]: Public-key records and fingerprints
//! - [`blob`]: Authentication-request decoding
//! - [`confirm`]: Confirmation code derivation
//! - [`identity`]: Identity string parsing
//! - [`error`]: Error types

pub mod blob;
pub mod confirm;
pub mod error;
pub mod framing;
pub mod identity;
pub mod pubkey;

pub use blob::{decode_auth_blob, AuthRequest, SSH_MSG_USERAUTH_REQUEST};
pub use confirm::{derive_code, digit_for_byte, ConfirmationCode, CODE_LENGTH, SAMPLE_OFFSETS};
pub use error::{ProtocolError, Result};
pub use framing::{encode_frame, FrameReader, FrameWriter, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
pub use identity::{parse_identity, Identity};
pub use pubkey::{
    parse_public_key, Fingerprint, KeyType, PublicKeyRecord, ED25519_KEY_LENGTH,
    FINGERPRINT_LENGTH, NISTP256_POINT_LENGTH,
};
