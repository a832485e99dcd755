//! Backend construction from configuration.

use super::{
    anthropic, mistral, ollama, openai, AnthropicBackend, Backend, MistralBackend, OllamaBackend,
    OpenAiBackend, RequestOptions,
};
use crate::config::{BackendConfig, Config};
use crate::error::CaptionError;
use std::sync::Arc;

/// Read a credential from the named environment variable.
///
/// Returns `None` when no variable is configured, it is unset, or it holds
/// only whitespace.
pub fn resolve_credential(env_var: Option<&str>) -> Option<String> {
    let var = env_var?.trim();
    if var.is_empty() {
        return None;
    }
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Factory that creates the backend a config entry describes.
pub struct BackendFactory;

impl BackendFactory {
    /// Create the backend for `[backends.<name>]`.
    ///
    /// The credential is read once, here; a backend whose variable is unset
    /// is still created but reports itself unavailable.
    ///
    /// # Errors
    /// `UnknownBackendType` when `type` names no implementation.
    pub fn create(
        name: &str,
        backend: &BackendConfig,
        config: &Config,
    ) -> Result<Arc<dyn Backend>, CaptionError> {
        let options = RequestOptions {
            max_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
            timeout: config.request_timeout(backend),
            max_file_bytes: config.max_file_bytes(),
        };
        let api_key = resolve_credential(backend.api_key_env.as_deref());
        let endpoint = |default: &str| backend.endpoint.clone().unwrap_or_else(|| default.to_string());

        let created: Arc<dyn Backend> = match backend.kind.as_str() {
            "openai" => Arc::new(OpenAiBackend::new(
                &endpoint(openai::DEFAULT_ENDPOINT),
                api_key,
                &backend.model,
                options,
            )),
            "anthropic" => Arc::new(AnthropicBackend::new(
                &endpoint(anthropic::DEFAULT_ENDPOINT),
                api_key,
                &backend.model,
                options,
            )),
            "mistral" => Arc::new(MistralBackend::new(
                &endpoint(mistral::DEFAULT_ENDPOINT),
                api_key,
                &backend.model,
                options,
            )),
            "ollama" => Arc::new(OllamaBackend::new(
                &endpoint(ollama::DEFAULT_ENDPOINT),
                &backend.model,
                options,
            )),
            other => {
                return Err(CaptionError::UnknownBackendType {
                    name: name.to_string(),
                    kind: other.to_string(),
                })
            }
        };

        tracing::debug!(
            "Created backend {name} ({} / {}), available: {}",
            created.kind(),
            created.model(),
            created.is_available()
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_credential() {
        // No variable configured
        assert_eq!(resolve_credential(None), None);
        assert_eq!(resolve_credential(Some("  ")), None);
        // Unset variable
        assert_eq!(resolve_credential(Some("CAPTIONER_DEFINITELY_NOT_SET_XYZ")), None);
    }

    #[test]
    fn test_resolve_credential_reads_env() {
        std::env::set_var("CAPTIONER_TEST_FACTORY_KEY", " sk-123 ");
        assert_eq!(
            resolve_credential(Some("CAPTIONER_TEST_FACTORY_KEY")),
            Some("sk-123".to_string())
        );
        std::env::set_var("CAPTIONER_TEST_FACTORY_BLANK", "");
        assert_eq!(resolve_credential(Some("CAPTIONER_TEST_FACTORY_BLANK")), None);
    }

    #[test]
    fn test_create_each_known_type() {
        let config = Config::default();
        for kind in ["openai", "anthropic", "mistral", "ollama"] {
            let backend = BackendFactory::create("x", &BackendConfig::new(kind, "m"), &config)
                .unwrap();
            assert_eq!(backend.kind(), kind);
            assert_eq!(backend.model(), "m");
        }
    }

    #[test]
    fn test_create_unknown_type_fails() {
        let config = Config::default();
        let err = BackendFactory::create("weird", &BackendConfig::new("florence2", "m"), &config)
            .err()
            .unwrap();
        assert_eq!(
            err,
            CaptionError::UnknownBackendType {
                name: "weird".to_string(),
                kind: "florence2".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_credential_means_unavailable() {
        let config = Config::default();
        let entry = BackendConfig::new("openai", "gpt-4o-mini")
            .with_api_key_env("CAPTIONER_DEFINITELY_NOT_SET_ABC");
        let backend = BackendFactory::create("gpt", &entry, &config).unwrap();
        assert!(!backend.is_available());

        let ollama = BackendFactory::create("local", &BackendConfig::new("ollama", "llava"), &config)
            .unwrap();
        assert!(ollama.is_available());
    }
}
