//! Configuration loading from disk combined with environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use agent::config::Config;
use protocol::KeyType;
use serial_test::serial;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
#[serial]
fn test_file_then_env_overrides() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[agent]
log_level = "warn"

[device]
path = "/dev/hidraw1"
slot = 5
curve = "nistp256"

[signing]
poll_timeout_ms = 100
"#,
    );

    std::env::set_var("TOKENSSH_DEVICE", "/dev/hidraw9");
    std::env::remove_var("TOKENSSH_LOG_LEVEL");

    let mut config = Config::load(&path).unwrap();
    config.apply_env_overrides();
    std::env::remove_var("TOKENSSH_DEVICE");

    assert_eq!(config.device.path, PathBuf::from("/dev/hidraw9"));
    assert_eq!(config.agent.log_level, "warn");
    assert_eq!(config.device.slot, 5);
    assert!(config.validate().is_ok());

    let settings = config.session_settings();
    assert_eq!(settings.key_type, KeyType::EcdsaNistp256);
    assert_eq!(settings.signing.poll_timeout, Duration::from_millis(100));
    assert_eq!(settings.signing.max_attempts, 50);
}

#[test]
#[serial]
fn test_env_log_level_fails_validation_when_unknown() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    std::env::set_var("TOKENSSH_LOG_LEVEL", "chatty");
    let mut config = Config::load(&path).unwrap();
    config.apply_env_overrides();
    std::env::remove_var("TOKENSSH_LOG_LEVEL");

    assert!(config.validate().is_err());
}

#[test]
fn test_saved_config_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokenssh").join("config.toml");

    let mut config = Config::default();
    config.agent.log_file = Some(dir.path().join("agent.log"));
    config.signing.max_attempts = 20;
    config.save(&path).unwrap();

    let reloaded = Config::load(&path).unwrap();
    assert_eq!(reloaded, config);
}
