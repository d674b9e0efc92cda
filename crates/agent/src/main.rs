//! TokenSSH Agent
//!
//! Command-line front end for signing SSH logins with a hardware token.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use agent::config::{default_config_path, Config};
use agent::session::DeviceSession;
use agent::signing::Signature;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use protocol::{decode_auth_blob, derive_code, AuthRequest, ConfirmationCode, Identity};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// TokenSSH Agent - sign SSH logins with a hardware token.
#[derive(Parser, Debug)]
#[command(name = "tokenssh-agent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// HID device node of the token (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub device: Option<PathBuf>,

    /// Key slot index on the token (overrides config)
    #[arg(long, global = true)]
    pub slot: Option<u32>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the public key for an identity in authorized_keys format
    PublicKey {
        /// Identity such as user@host
        identity: String,
    },

    /// Have the token sign an SSH authentication request
    Sign {
        /// Identity such as user@host
        identity: String,

        /// File holding the raw request blob (stdin is kept for the prompt)
        #[arg(long, value_name = "FILE", value_parser = parse_sign_blob)]
        blob: PathBuf,

        /// Output encoding of the signature
        #[arg(long, short, value_enum, default_value = "hex")]
        format: SignatureFormat,
    },

    /// Decode a request blob and show its confirmation code
    Inspect {
        /// File holding the raw request blob ("-" for stdin)
        #[arg(long, value_name = "FILE")]
        blob: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show how an identity string is interpreted
    Identity {
        /// Identity such as ssh://user@host:22/path
        identity: String,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration file actions.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Output encoding for signatures.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    /// Lowercase hexadecimal
    Hex,
    /// Standard base64
    Base64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;

    // Apply environment variable overrides, then command-line overrides
    let env_overrides = config.apply_env_overrides();
    if let Some(device) = &cli.device {
        config.device.path = device.clone();
    }
    if let Some(slot) = cli.slot {
        config.device.slot = slot;
    }
    config.validate().context("Invalid configuration")?;

    let _guard = init_tracing(&config, cli.verbose)?;
    for (var, value) in &env_overrides {
        tracing::info!("Overriding configuration from {}: {}", var, value);
    }
    tracing::debug!("TokenSSH agent starting with {:?}", cli.command);

    match cli.command {
        Commands::PublicKey { identity } => {
            let identity = Identity::for_ssh(&identity, config.device.slot);
            let mut session = open_session(&config)?;
            let line = session
                .export_public_key(&identity)
                .context("Failed to fetch public key")?;
            println!("{}", line);
        }
        Commands::Sign {
            identity,
            blob,
            format,
        } => {
            let identity = Identity::for_ssh(&identity, config.device.slot);
            let blob = read_blob(&blob)?;
            let signature = sign(&config, &identity, &blob)?;
            println!("{}", format_signature(&signature, format));
        }
        Commands::Inspect { blob, json } => {
            let raw = read_blob(&blob)?;
            let request = decode_auth_blob(&raw).context("Failed to decode request blob")?;
            let code = derive_code(&raw);
            if json {
                println!("{}", serde_json::to_string_pretty(&inspect_json(&request, code))?);
            } else {
                print_request(&request, code);
            }
        }
        Commands::Identity { identity } => {
            let identity = Identity::for_ssh(&identity, config.device.slot);
            println!("{}", serde_json::to_string_pretty(&identity)?);
        }
        Commands::Config {
            action: ConfigAction::Init { force },
        } => {
            init_config(&config, &config_path, force)?;
            println!("Wrote configuration to {}", config_path.display());
        }
    }

    Ok(())
}

/// Install the tracing subscriber. The returned guard flushes file logs on drop.
fn init_tracing(config: &Config, verbose: bool) -> Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&config.agent.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    match &config.agent.log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .with_context(|| format!("log_file has no file name: {}", path.display()))?;
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[cfg(unix)]
fn open_session(config: &Config) -> Result<DeviceSession<agent::HidrawTransport>> {
    let transport = agent::HidrawTransport::new(&config.device.path);
    DeviceSession::open(transport, config.session_settings())
        .with_context(|| format!("Failed to open token at {}", config.device.path.display()))
}

#[cfg(not(unix))]
fn open_session(_config: &Config) -> Result<DeviceSession<agent::ScriptedTransport>> {
    bail!("no token transport is available on this platform")
}

#[cfg(unix)]
fn sign(config: &Config, identity: &Identity, blob: &[u8]) -> Result<Signature> {
    let mut session = open_session(config)?;
    let mut confirmer =
        agent::TerminalConfirmer::stdio().context("Failed to open stdin for confirmation")?;
    let cancel = CancellationToken::new();
    session
        .sign_ssh_challenge(identity, blob, &mut confirmer, &cancel)
        .context("Signing failed")
}

#[cfg(not(unix))]
fn sign(_config: &Config, _identity: &Identity, _blob: &[u8]) -> Result<Signature> {
    bail!("no token transport is available on this platform")
}

/// Stdin acknowledges the confirmation code while signing, so it cannot
/// also carry the blob.
fn parse_sign_blob(value: &str) -> std::result::Result<PathBuf, String> {
    if value == "-" {
        return Err("stdin is used for the confirmation prompt; pass the blob as a file".to_string());
    }
    Ok(PathBuf::from(value))
}

fn init_config(config: &Config, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    config.save(path)
}

fn read_blob(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut raw = Vec::new();
        io::stdin()
            .read_to_end(&mut raw)
            .context("Failed to read blob from stdin")?;
        return Ok(raw);
    }
    fs::read(path).with_context(|| format!("Failed to read blob file: {}", path.display()))
}

fn format_signature(signature: &Signature, format: SignatureFormat) -> String {
    match format {
        SignatureFormat::Hex => signature.to_hex(),
        SignatureFormat::Base64 => signature.to_base64(),
    }
}

fn inspect_json(request: &AuthRequest, code: ConfirmationCode) -> serde_json::Value {
    serde_json::json!({
        "nonce": hex::encode(&request.nonce),
        "message_type": request.message_type,
        "user": request.user,
        "connection_id": request.connection_id,
        "auth_method": request.auth_method,
        "has_signature": request.has_signature,
        "key_type": request.key_type,
        "key_type_matches": request.key_type_matches(),
        "public_key": {
            "type": request.public_key.key_type().algorithm(),
            "fingerprint": request.public_key.fingerprint().to_string(),
            "openssh": request.public_key.to_openssh(""),
        },
        "confirmation_code": code.digits(),
    })
}

fn print_request(request: &AuthRequest, code: ConfirmationCode) {
    println!("User:          {}", request.user);
    println!("Service:       {}", request.connection_id);
    println!("Method:        {}", request.auth_method);
    println!("Key type:      {}", request.key_type);
    println!("Fingerprint:   {}", request.public_key.fingerprint());
    println!("Nonce:         {}", hex::encode(&request.nonce));
    if !request.key_type_matches() {
        println!(
            "Warning:       announced key type does not match {}",
            request.public_key.key_type()
        );
    }
    println!("Code:          {}", code);
}
