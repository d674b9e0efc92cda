//! Configuration management for the TokenSSH agent.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/tokenssh/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use protocol::KeyType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionSettings;
use crate::signing::SigningPolicy;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("slot must be between 1 and 99, got {0}")]
    InvalidSlot(u32),

    #[error("max_attempts must be between 1 and 1000, got {0}")]
    InvalidMaxAttempts(u32),

    #[error("poll_timeout_ms must be between 1 and 10000, got {0}")]
    InvalidPollTimeout(u64),

    #[error("device path must not be empty")]
    EmptyDevicePath,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General agent configuration.
    pub agent: AgentConfig,

    /// Token device configuration.
    pub device: DeviceConfig,

    /// Signing exchange configuration.
    pub signing: SigningConfig,
}

/// General agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Write logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

/// Token device configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// HID device node of the token.
    pub path: PathBuf,

    /// Default key slot index.
    pub slot: u32,

    /// Curve of the stored keys.
    pub curve: KeyType,

    /// Wait per read when discarding stale messages on open.
    pub open_drain_timeout_ms: u64,

    /// Wait for a requested public key.
    pub public_key_timeout_ms: u64,
}

/// Signing exchange configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SigningConfig {
    /// Polls before a signing request times out.
    pub max_attempts: u32,

    /// Wait per poll in milliseconds.
    pub poll_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/hidraw0"),
            slot: 1,
            curve: KeyType::Ed25519,
            open_drain_timeout_ms: 50,
            public_key_timeout_ms: 1000,
        }
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            poll_timeout_ms: 250,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tokenssh")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - TOKENSSH_DEVICE: Override the device node path
    /// - TOKENSSH_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    ///
    /// Returns the variables that were applied with their values, so they can
    /// be logged once tracing is installed.
    pub fn apply_env_overrides(&mut self) -> Vec<(&'static str, String)> {
        let mut applied = Vec::new();

        if let Ok(device) = std::env::var("TOKENSSH_DEVICE") {
            if !device.is_empty() {
                self.device.path = PathBuf::from(&device);
                applied.push(("TOKENSSH_DEVICE", device));
            }
        }

        if let Ok(level) = std::env::var("TOKENSSH_LOG_LEVEL") {
            if !level.is_empty() {
                self.agent.log_level = level.clone();
                applied.push(("TOKENSSH_LOG_LEVEL", level));
            }
        }

        applied
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=99).contains(&self.device.slot) {
            return Err(ConfigError::InvalidSlot(self.device.slot));
        }

        if self.device.path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDevicePath);
        }

        if !(1..=1000).contains(&self.signing.max_attempts) {
            return Err(ConfigError::InvalidMaxAttempts(self.signing.max_attempts));
        }

        if !(1..=10_000).contains(&self.signing.poll_timeout_ms) {
            return Err(ConfigError::InvalidPollTimeout(self.signing.poll_timeout_ms));
        }

        let level = self.agent.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.agent.log_level.clone()));
        }

        Ok(())
    }

    /// Session timing and key selection derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            drain_timeout: Duration::from_millis(self.device.open_drain_timeout_ms),
            public_key_timeout: Duration::from_millis(self.device.public_key_timeout_ms),
            key_type: self.device.curve,
            signing: SigningPolicy {
                max_attempts: self.signing.max_attempts,
                poll_timeout: Duration::from_millis(self.signing.poll_timeout_ms),
            },
        }
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.agent.log_level, "info");
        assert!(config.agent.log_file.is_none());
        assert_eq!(config.device.path, PathBuf::from("/dev/hidraw0"));
        assert_eq!(config.device.slot, 1);
        assert_eq!(config.device.curve, KeyType::Ed25519);
        assert_eq!(config.signing.max_attempts, 50);
        assert_eq!(config.signing.poll_timeout_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("tokenssh/config.toml"));
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[device]
slot = 4
curve = "nistp256"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.device.slot, 4);
        assert_eq!(config.device.curve, KeyType::EcdsaNistp256);
        // Other values should be defaults
        assert_eq!(config.device.path, PathBuf::from("/dev/hidraw0"));
        assert_eq!(config.signing, SigningConfig::default());
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[agent]
log_level = "debug"
log_file = "/var/log/tokenssh.log"

[device]
path = "/dev/hidraw3"
slot = 12
curve = "ed25519"
open_drain_timeout_ms = 20
public_key_timeout_ms = 2000

[signing]
max_attempts = 100
poll_timeout_ms = 500
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.agent.log_level, "debug");
        assert_eq!(
            config.agent.log_file,
            Some(PathBuf::from("/var/log/tokenssh.log"))
        );
        assert_eq!(config.device.path, PathBuf::from("/dev/hidraw3"));
        assert_eq!(config.device.slot, 12);
        assert_eq!(config.device.open_drain_timeout_ms, 20);
        assert_eq!(config.device.public_key_timeout_ms, 2000);
        assert_eq!(config.signing.max_attempts, 100);
        assert_eq!(config.signing.poll_timeout_ms, 500);
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let toml = r#"
[device
slot = 2
"#;
        let err = Config::from_toml(toml).unwrap_err().to_string();
        assert!(err.contains("Invalid TOML"));
    }

    #[test]
    fn test_from_toml_unknown_curve() {
        let toml = r#"
[device]
curve = "rsa"
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_roundtrip_custom() {
        let mut original = Config::default();
        original.agent.log_level = "warn".to_string();
        original.agent.log_file = Some(PathBuf::from("/tmp/agent.log"));
        original.device.curve = KeyType::EcdsaNistp256;
        original.signing.max_attempts = 7;

        let loaded = Config::from_toml(&original.to_toml().unwrap()).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = Config::default();
        config.device.slot = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSlot(0)));

        let mut config = Config::default();
        config.device.slot = 100;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSlot(100)));

        let mut config = Config::default();
        config.signing.max_attempts = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxAttempts(0)));

        let mut config = Config::default();
        config.signing.poll_timeout_ms = 10_001;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidPollTimeout(10_001))
        );

        let mut config = Config::default();
        config.device.path = PathBuf::new();
        assert_eq!(config.validate(), Err(ConfigError::EmptyDevicePath));
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        config.agent.log_level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.agent.log_level = "loud".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("loud".to_string()))
        );
    }

    #[test]
    fn test_session_settings() {
        let mut config = Config::default();
        config.signing.poll_timeout_ms = 100;
        config.signing.max_attempts = 3;

        let settings = config.session_settings();
        assert_eq!(settings.drain_timeout, Duration::from_millis(50));
        assert_eq!(settings.public_key_timeout, Duration::from_millis(1000));
        assert_eq!(settings.signing.max_attempts, 3);
        assert_eq!(settings.signing.worst_case(), Duration::from_millis(300));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.device.slot = 9;
        config.save(&path).unwrap();

        assert!(path.exists());
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_invalid_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[signing]\nmax_attempts = \"many\"\n").unwrap();

        let err = format!("{:#}", Config::load(&path).unwrap_err());
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("TOKENSSH_DEVICE", "/dev/hidraw7");
        std::env::set_var("TOKENSSH_LOG_LEVEL", "trace");

        let mut config = Config::default();
        let applied = config.apply_env_overrides();

        std::env::remove_var("TOKENSSH_DEVICE");
        std::env::remove_var("TOKENSSH_LOG_LEVEL");

        assert_eq!(config.device.path, PathBuf::from("/dev/hidraw7"));
        assert_eq!(config.agent.log_level, "trace");
        assert_eq!(
            applied,
            vec![
                ("TOKENSSH_DEVICE", "/dev/hidraw7".to_string()),
                ("TOKENSSH_LOG_LEVEL", "trace".to_string()),
            ]
        );
    }

    #[test]
    #[serial]
    fn test_empty_env_values_ignored() {
        std::env::set_var("TOKENSSH_DEVICE", "");
        std::env::remove_var("TOKENSSH_LOG_LEVEL");

        let mut config = Config::default();
        let applied = config.apply_env_overrides();

        std::env::remove_var("TOKENSSH_DEVICE");
        assert_eq!(config.device.path, PathBuf::from("/dev/hidraw0"));
        assert!(applied.is_empty());
    }
}
