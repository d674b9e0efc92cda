//! # TokenSSH Agent Library
//!
//! Drives a hardware token that holds SSH private keys, so that logins can
//! be signed without the key ever leaving the device.
//!
//! ## Overview
//!
//! - **Device Transport**: HID reports to and from the token, or a scripted
//!   stand-in for tests
//! - **Device Session**: exclusive open/drain/close lifecycle around the link
//! - **Signing**: challenge, user confirmation, bounded polling for the result
//! - **Prompting**: cancellable wait for the user to enter the code on the token
//! - **Configuration**: TOML file with environment overrides
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 Device Session                │
//! │  ┌──────────────────┐  ┌───────────────────┐  │
//! │  │ Signing State    │  │ Confirmer         │  │
//! │  │ Machine          │◀─│ (terminal, fn)    │  │
//! │  └────────┬─────────┘  └───────────────────┘  │
//! │           ▼                                   │
//! │  ┌────────────────────────────────────────┐   │
//! │  │ DeviceTransport (hidraw, scripted)     │   │
//! │  └────────────────────────────────────────┘   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent::{Config, DeviceSession, HidrawTransport, TerminalConfirmer};
//! use protocol::Identity;
//! use tokio_util::sync::CancellationToken;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let transport = HidrawTransport::new(&config.device.path);
//!     let mut session = DeviceSession::open(transport, config.session_settings())?;
//!
//!     let identity = Identity::for_ssh("alice@host.example", config.device.slot);
//!     println!("{}", session.export_public_key(&identity)?);
//!
//!     let blob = std::fs::read("challenge.bin")?;
//!     let mut confirmer = TerminalConfirmer::stdio()?;
//!     let signature =
//!         session.sign_ssh_challenge(&identity, &blob, &mut confirmer, &CancellationToken::new())?;
//!     println!("{}", signature.to_hex());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod prompt;
pub mod session;
pub mod signing;

pub use config::{default_config_path, Config, ConfigError};
#[cfg(unix)]
pub use device::hidraw::HidrawTransport;
pub use device::scripted::{ScriptedResponse, ScriptedTransport};
pub use device::{DeviceTransport, Opcode, Slot};
pub use error::{AgentError, Result};
pub use prompt::{ConfirmationRequest, Confirmer};
#[cfg(unix)]
pub use prompt::TerminalConfirmer;
pub use session::{DeviceSession, SessionSettings};
pub use signing::{sign_challenge, Challenge, Signature, SigningPolicy, SigningSession, SigningState};
