//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    ///
    /// Backend types are not checked here; the backend factory rejects
    /// unknown types when the registry is built.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.parallel == 0 {
            return Err(ConfigError::ValidationError(
                "generation.parallel must be > 0".into(),
            ));
        }
        if self.generation.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_tokens must be > 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.limits.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        for (name, backend) in &self.backends {
            if backend.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{name}.model must not be empty"
                )));
            }
            if backend.timeout_ms == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "backends.{name}.timeout_ms must be > 0"
                )));
            }
        }
        if let Some(default) = &self.generation.default_backend {
            if !self.backends.contains_key(default) {
                return Err(ConfigError::ValidationError(format!(
                    "generation.default_backend '{default}' is not a configured backend"
                )));
            }
        }
        Ok(())
    }
}
