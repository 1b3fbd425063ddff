//! Configuration management for the smOTA host tool.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/smota/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smota_protocol::PROJECT_ID_LENGTH;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("project_id must be at most {PROJECT_ID_LENGTH} ASCII bytes, got {0:?}")]
    InvalidProjectId(String),

    #[error("{0} must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("total_timeout_ms ({total}) must cover the per-phase timeouts (sum {sum})")]
    TotalTimeoutTooSmall { total: u32, sum: u32 },
}

/// Main configuration structure for the smOTA host tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Key material locations.
    pub keys: KeysConfig,

    /// Handshake parameters announced to devices.
    pub handshake: HandshakeConfig,
}

/// Key material locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeysConfig {
    /// Directory where generated key files are stored.
    pub key_dir: PathBuf,

    /// File name of the ECDSA private key within `key_dir`.
    pub private_key: String,
}

/// Handshake parameters offered to devices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Project identifier announced during the handshake.
    pub project_id: String,

    /// Per-block transfer timeout in milliseconds.
    pub block_timeout_ms: u16,

    /// Integrity check timeout in milliseconds.
    pub check_timeout_ms: u16,

    /// Install phase timeout in milliseconds.
    pub install_timeout_ms: u16,

    /// Whole-session timeout in milliseconds.
    pub total_timeout_ms: u32,

    /// How long the host waits for the handshake response, in milliseconds.
    pub response_timeout_ms: u64,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            key_dir: default_key_dir(),
            private_key: "ecdsa_private_key.pem".to_string(),
        }
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            project_id: "TEST_PROJECT_123".to_string(),
            block_timeout_ms: 5000,
            check_timeout_ms: 30000,
            install_timeout_ms: 60000,
            total_timeout_ms: 300_000,
            response_timeout_ms: 5000,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smota")
        .join("config.toml")
}

/// Returns the default key directory path.
fn default_key_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("smota")
        .join("keys")
}

impl HostConfig {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - SMOTA_PROJECT_ID: Override the handshake project identifier
    /// - SMOTA_KEY_DIR: Override the key material directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("SMOTA_PROJECT_ID") {
            if !id.is_empty() {
                tracing::info!("Overriding project_id from environment: {}", id);
                self.handshake.project_id = id;
            }
        }

        if let Ok(dir) = std::env::var("SMOTA_KEY_DIR") {
            if !dir.is_empty() {
                tracing::info!("Overriding key_dir from environment: {}", dir);
                self.keys.key_dir = PathBuf::from(dir);
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let id = &self.handshake.project_id;
        if id.len() > PROJECT_ID_LENGTH || !id.is_ascii() {
            return Err(ConfigError::InvalidProjectId(id.clone()));
        }

        if self.handshake.block_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("block_timeout_ms"));
        }
        if self.handshake.check_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("check_timeout_ms"));
        }
        if self.handshake.install_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("install_timeout_ms"));
        }
        if self.handshake.total_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("total_timeout_ms"));
        }
        if self.handshake.response_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("response_timeout_ms"));
        }

        let sum = u32::from(self.handshake.block_timeout_ms)
            + u32::from(self.handshake.check_timeout_ms)
            + u32::from(self.handshake.install_timeout_ms);
        if self.handshake.total_timeout_ms < sum {
            return Err(ConfigError::TotalTimeoutTooSmall {
                total: self.handshake.total_timeout_ms,
                sum,
            });
        }

        Ok(())
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
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", e.message()))
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
