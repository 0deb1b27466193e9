//! Configuration loading from chronolog.toml.

use chrono::TimeDelta;
use datastore::{DocumentStoreConfig, StorageConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "chronolog.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Backend selection.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Connection settings, used when `storage.backend = "document-store"`.
    #[serde(default)]
    pub document_store: DocumentStoreConfig,

    #[serde(default)]
    pub flood: FloodConfig,
}

/// Defaults for flooding and heartbeats.
#[derive(Debug, Deserialize)]
pub struct FloodConfig {
    #[serde(default = "default_pulsetime_secs")]
    pub pulsetime_secs: f64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            pulsetime_secs: default_pulsetime_secs(),
        }
    }
}

fn default_pulsetime_secs() -> f64 {
    transform::DEFAULT_PULSETIME.num_milliseconds() as f64 / 1000.0
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        pulsetime_from_secs(config.flood.pulsetime_secs)?;
        Ok(config)
    }

    /// Load `path` if given, otherwise the user's config file if present,
    /// otherwise defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn pulsetime(&self) -> Result<TimeDelta, ConfigError> {
        pulsetime_from_secs(self.flood.pulsetime_secs)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chronolog").join(CONFIG_FILE))
}

/// Convert a pulsetime given in (fractional) seconds.
pub fn pulsetime_from_secs(secs: f64) -> Result<TimeDelta, ConfigError> {
    if !secs.is_finite() || secs < 0.0 || secs > i64::MAX as f64 / 1_000_000.0 {
        return Err(ConfigError::InvalidPulsetime(secs));
    }
    Ok(TimeDelta::microseconds((secs * 1_000_000.0).round() as i64))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("pulsetime must be a non-negative number of seconds, got {0}")]
    InvalidPulsetime(f64),
}
