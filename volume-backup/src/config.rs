//! Configuration management for volume backups.
//!
//! Loads configuration from a TOML file; command-line flags override it.

use crate::utils::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub restore: RestoreConfig,
}

/// Transport used to reach the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Unix,
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Unix => f.write_str("unix"),
            Protocol::Tcp => f.write_str("tcp"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Socket path (unix) or host:port (tcp)
    #[serde(default = "default_addr")]
    pub addr: String,

    #[serde(default = "default_proto")]
    pub proto: Protocol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Restore recorded uid/gid (needs privileges for foreign owners)
    #[serde(default = "default_preserve_ownership")]
    pub preserve_ownership: bool,
}

// Default values
fn default_addr() -> String {
    "/var/run/docker.sock".to_string()
}

fn default_proto() -> Protocol {
    Protocol::Unix
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_preserve_ownership() -> bool {
    true
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            proto: default_proto(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            preserve_ownership: default_preserve_ownership(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BackupError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BackupError::Config(e.to_string()))
    }
}
