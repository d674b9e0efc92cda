//! Identity strings such as `ssh://alice@example.com:22/path`.
//!
//! Parsing is permissive and never fails: every component
//! except the host is optional, and the host itself may be empty. Anything
//! stricter is up to the caller.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static IDENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)^",
        r"(?:(?P<protocol>.*)://)?",
        r"(?:(?P<user>.*)@)?",
        r"(?P<host>.*?)",
        r"(?::(?P<port>\w*))?",
        r"(?P<path>/.*)?",
        r"$",
    ))
    .expect("identity pattern is valid")
});

/// Decomposed identity string.
///
/// Only components that matched non-empty text are set. `index` and the
/// `ssh` protocol are supplied by the caller through [`Identity::for_ssh`],
/// not parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Scheme before `://`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// User before `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Host name; empty when the string had none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    /// Port after `:`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Path starting at the first `/` after the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Key index chosen by the caller.
    #[serde(default)]
    pub index: u32,
}

impl Identity {
    /// Parse `label` and mark it as an SSH identity at `index`.
    pub fn for_ssh(label: &str, index: u32) -> Self {
        Self {
            protocol: Some("ssh".to_string()),
            index,
            ..parse_identity(label)
        }
    }
}

/// Formats as `[user@]host[:port][path]`, the label used for exported keys.
/// The protocol and index are not part of the label.
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = &self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(path) = &self.path {
            f.write_str(path)?;
        }
        Ok(())
    }
}

/// Split `s` into identity components. Never fails.
pub fn parse_identity(s: &str) -> Identity {
    let Some(caps) = IDENTITY_PATTERN.captures(s) else {
        // Unreachable with the (?s) pattern; keep the whole input as host.
        return Identity {
            host: s.to_string(),
            ..Identity::default()
        };
    };

    let group = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str())
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
    };

    Identity {
        protocol: group("protocol"),
        user: group("user"),
        host: group("host").unwrap_or_default(),
        port: group("port"),
        path: group("path"),
        index: 0,
    }
}
