//! Configuration management for Captioner.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file only
//! overrides what it names.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure for Captioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Caption generation settings
    pub generation: GenerationConfig,

    /// Request limits
    pub limits: LimitsConfig,

    /// Image discovery settings
    pub processing: ProcessingConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Backends keyed by the name users select them with
    pub backends: BTreeMap<String, BackendConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            limits: LimitsConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
            backends: default_backends(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// A file that brings its own `[backends]` but names no
    /// `generation.default_backend` does not inherit the built-in default
    /// when that backend is not among its own; the default is cleared
    /// instead. An explicitly named default must still exist.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let raw: toml::Table = toml::from_str(content)?;
        let names_default = raw
            .get("generation")
            .and_then(|generation| generation.get("default_backend"))
            .is_some();

        let mut config: Config = toml::Value::Table(raw).try_into()?;
        if !names_default {
            config.drop_unknown_default_backend();
        }
        config.validate()?;
        Ok(config)
    }

    fn drop_unknown_default_backend(&mut self) {
        let unknown = self
            .generation
            .default_backend
            .as_ref()
            .is_some_and(|name| !self.backends.contains_key(name));
        if unknown {
            tracing::debug!(
                "Built-in default backend {:?} is not configured, leaving default unset",
                self.generation.default_backend
            );
            self.generation.default_backend = None;
        }
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.yofardev.captioner/config.toml
    /// - Linux: ~/.config/captioner/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\yofardev\captioner\config\config.toml
    ///
    /// Falls back to ~/.captioner/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "yofardev", "captioner")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".captioner").join("config.toml")
            })
    }

    /// Request timeout for a backend, honoring its per-backend override.
    pub fn request_timeout(&self, backend: &BackendConfig) -> Duration {
        Duration::from_millis(backend.timeout_ms.unwrap_or(self.limits.request_timeout_ms))
    }

    /// Upload size limit in bytes.
    pub fn max_file_bytes(&self) -> u64 {
        self.limits.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
