//! Configuration management for the chatbot client.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/chatbot-client/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use protocol::{Endpoint, DEFAULT_HOST, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(u16),

    #[error("address is not a valid IP address or hostname: {0}")]
    InvalidAddress(String),

    #[error("reply_timeout_secs must be between 0 and 86400 seconds, got {0}")]
    InvalidReplyTimeout(u64),

    #[error("log level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound for the reply timeout (one day).
const MAX_REPLY_TIMEOUT_SECS: u64 = 86_400;

/// Main configuration structure for the chatbot client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Remote server settings.
    pub server: ServerConfig,

    /// Session behaviour.
    pub session: SessionConfig,

    /// Console behaviour.
    pub console: ConsoleConfig,

    /// Logging settings.
    pub log: LogConfig,
}

/// Remote server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or IP address of the server.
    pub address: String,

    /// TCP port of the server.
    pub port: u16,

    /// Timeout in seconds for establishing the connection (0 = OS default).
    pub connect_timeout_secs: u64,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds to wait for each reply (0 = wait forever).
    pub reply_timeout_secs: u64,
}

/// Console configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Clear the terminal on start-up.
    pub clear_screen: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub level: String,

    /// Write logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { clear_screen: true }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatbot-client")
        .join("config.toml")
}

/// Environment overrides seen by [`Config::apply_env_overrides`].
///
/// Overrides are applied before the subscriber exists, so they are reported
/// back to the caller to be logged once tracing is initialized.
#[derive(Debug, Default, PartialEq)]
pub struct EnvOverrides {
    /// Overrides that took effect, as `NAME=value`.
    pub applied: Vec<String>,
    /// Overrides that were ignored, with the reason.
    pub rejected: Vec<String>,
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - CHATBOT_ADDRESS: Override server address
    /// - CHATBOT_PORT: Override server port
    /// - CHATBOT_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) -> EnvOverrides {
        let mut report = EnvOverrides::default();

        if let Ok(address) = std::env::var("CHATBOT_ADDRESS") {
            if !address.is_empty() {
                report.applied.push(format!("CHATBOT_ADDRESS={}", address));
                self.server.address = address;
            }
        }

        if let Ok(port) = std::env::var("CHATBOT_PORT") {
            if !port.is_empty() {
                match port.trim().parse::<u16>() {
                    Ok(value) => {
                        report.applied.push(format!("CHATBOT_PORT={}", value));
                        self.server.port = value;
                    }
                    Err(e) => {
                        report
                            .rejected
                            .push(format!("CHATBOT_PORT={:?}: {}", port, e));
                    }
                }
            }
        }

        if let Ok(level) = std::env::var("CHATBOT_LOG_LEVEL") {
            if !level.is_empty() {
                report.applied.push(format!("CHATBOT_LOG_LEVEL={}", level));
                self.log.level = level;
            }
        }

        report
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if Endpoint::new(&self.server.address, self.server.port).is_err() {
            return Err(ConfigError::InvalidAddress(self.server.address.clone()));
        }

        if self.session.reply_timeout_secs > MAX_REPLY_TIMEOUT_SECS {
            return Err(ConfigError::InvalidReplyTimeout(
                self.session.reply_timeout_secs,
            ));
        }

        let level = self.log.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }

        Ok(())
    }

    /// Connect timeout, or `None` to use the OS default.
    pub fn connect_timeout(&self) -> Option<Duration> {
        seconds(self.server.connect_timeout_secs)
    }

    /// Reply timeout, or `None` to wait forever.
    pub fn reply_timeout(&self) -> Option<Duration> {
        seconds(self.session.reply_timeout_secs)
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
