//! Agent configuration and its TOML file form.
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to change:
//!
//! ```toml
//! peer_host = "10.0.0.2"
//! peer_port = 4000
//! identifier = 1234
//! heartbeat_interval_secs = 30
//! count_policy = "successes"
//! ```
//!
//! The binary layers `.env`, environment variables and CLI flags on top of
//! what is loaded here, then calls [`AgentConfig::validate`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::counter::CountPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable (zero port, empty host, ...).
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Resolved configuration of one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Host of the peer that receives our heartbeats.
    #[serde(default = "default_peer_host")]
    pub peer_host: String,
    #[serde(default = "default_peer_port")]
    pub peer_port: u16,
    /// Address the status listener binds to.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Host advertised in heartbeats.  Falls back to `listen_host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_host: Option<String>,
    #[serde(default = "default_identifier")]
    pub identifier: u32,
    #[serde(default = "default_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default)]
    pub count_policy: CountPolicy,
    /// Bound on connect and read waits.  Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_timeout_secs: Option<u64>,
    /// Send the one-off `First Message` greeting at startup.
    #[serde(default = "default_true")]
    pub send_greeting: bool,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Append log lines to this file as well as the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_peer_host() -> String {
    "127.0.0.1".to_string()
}
fn default_peer_port() -> u16 {
    4000
}
fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}
fn default_listen_port() -> u16 {
    2222
}
fn default_identifier() -> u32 {
    1
}
fn default_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            peer_host: default_peer_host(),
            peer_port: default_peer_port(),
            listen_host: default_listen_host(),
            listen_port: default_listen_port(),
            advertise_host: None,
            identifier: default_identifier(),
            heartbeat_interval_secs: default_interval(),
            count_policy: CountPolicy::default(),
            io_timeout_secs: None,
            send_greeting: default_true(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl AgentConfig {
    /// Host placed in outgoing heartbeats.
    pub fn advertise_host(&self) -> &str {
        self.advertise_host.as_deref().unwrap_or(&self.listen_host)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_secs.map(Duration::from_secs)
    }

    /// Rejects values the agent cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.peer_host.trim().is_empty() {
            return invalid("peer_host must not be empty");
        }
        if self.listen_host.trim().is_empty() {
            return invalid("listen_host must not be empty");
        }
        if self.advertise_host().trim().is_empty() {
            return invalid("advertise_host must not be empty");
        }
        if self.peer_port == 0 {
            return invalid("peer_port must be non-zero");
        }
        if self.listen_port == 0 {
            return invalid("listen_port must be non-zero");
        }
        if self.identifier == 0 {
            return invalid("identifier must be non-zero");
        }
        if self.heartbeat_interval_secs == 0 {
            return invalid("heartbeat_interval_secs must be non-zero");
        }
        if self.io_timeout_secs == Some(0) {
            return invalid("io_timeout_secs must be non-zero when set");
        }
        Ok(())
    }
}

/// Loads an [`AgentConfig`] from the TOML file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read (including when it
/// does not exist; an explicitly named file is expected to be there), and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_file(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
