//! Configuration management for the SafeLauncher session core.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/safe-launcher/config.toml`.
//!
//! The handshake timeouts are process-wide constants as far as users are
//! concerned, but they are carried here and injected into the Launcher at
//! construction so tests can shrink them instead of waiting wall-clock
//! defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("connect_timeout_ms must be between 100 and 600000, got {0}")]
    InvalidConnectTimeout(u64),

    #[error("handshake_timeout_ms must be between 100 and 600000, got {0}")]
    InvalidHandshakeTimeout(u64),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the SafeLauncher session core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General configuration.
    pub general: GeneralConfig,

    /// Launch handshake configuration.
    pub launch: LaunchConfig,
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for launcher-local data.
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Timeouts bounding one app launch attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LaunchConfig {
    /// How long a spawned app has to connect back, in milliseconds.
    /// Budgets slow process startup (OS scheduling, disk I/O).
    pub connect_timeout_ms: u64,

    /// How long the whole in-connection handshake may take, in
    /// milliseconds. Much tighter than the connect budget since all three
    /// messages are in-process work on both ends.
    pub handshake_timeout_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 60_000,
            handshake_timeout_ms: 10_000,
        }
    }
}

impl LaunchConfig {
    /// The connect deadline as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// The handshake deadline as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Config {
    /// Loads configuration from the given path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from the default path, or returns defaults
    /// if no file exists there.
    pub fn load_or_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Saves the configuration to the given path, creating parent
    /// directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.general.log_level.clone()));
        }
        if !(100..=600_000).contains(&self.launch.connect_timeout_ms) {
            return Err(ConfigError::InvalidConnectTimeout(
                self.launch.connect_timeout_ms,
            ));
        }
        if !(100..=600_000).contains(&self.launch.handshake_timeout_ms) {
            return Err(ConfigError::InvalidHandshakeTimeout(
                self.launch.handshake_timeout_ms,
            ));
        }
        Ok(())
    }
}

/// Initializes tracing for embedding binaries.
///
/// `RUST_LOG` overrides the configured level. Returns an error if a
/// global subscriber is already installed.
pub fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    Ok(())
}

/// Returns the default configuration file path,
/// `~/.config/safe-launcher/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("safe-launcher")
        .join("config.toml")
}

/// Returns the default data directory, `~/.local/share/safe-launcher`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("safe-launcher")
}
