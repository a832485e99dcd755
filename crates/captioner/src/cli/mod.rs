//! Command implementations.

pub mod backends;
pub mod caption;
pub mod config;

use captioner_core::config::expand_path;
use captioner_core::Config;
use std::path::PathBuf;

/// Where the configuration comes from: an explicit `--config` file or the
/// platform default location.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    explicit: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(explicit: Option<&str>) -> Self {
        Self {
            explicit: explicit.map(expand_path),
        }
    }

    /// Path the configuration is read from and `config init` writes to.
    pub fn path(&self) -> PathBuf {
        self.explicit.clone().unwrap_or_else(Config::default_path)
    }

    /// Load the configuration.
    ///
    /// An explicitly named file must exist and parse. A broken file at the
    /// default location only warns and falls back to defaults, so
    /// `config init --force` can still repair it.
    pub fn load(&self) -> anyhow::Result<Config> {
        if let Some(path) = &self.explicit {
            return Config::load_from(path)
                .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()));
        }

        match Config::load() {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `captioner config path`."
                );
                Ok(Config::default())
            }
        }
    }
}
