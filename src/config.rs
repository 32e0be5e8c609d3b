//! Configuration management
//!
//! Handles loading and validating client configuration from TOML files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default daemon socket
pub const DEFAULT_SOCKET: &str = "/run/imedge/daemon.sock";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Daemon connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Path to the daemon's Unix socket
    #[serde(default = "default_socket")]
    pub socket: PathBuf,
    /// Routing target attached to every call
    #[serde(default)]
    pub target: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            target: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_socket() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.client.socket.as_os_str().is_empty() {
            anyhow::bail!("client.socket must not be empty");
        }
        if matches!(self.client.target.as_deref(), Some("")) {
            anyhow::bail!("client.target must not be empty when set");
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            anyhow::bail!("logging.format must be \"json\" or \"pretty\"");
        }
        Ok(())
    }
}
