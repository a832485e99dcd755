//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::prompt::DEFAULT_PROMPT;

/// Caption generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum concurrent backend calls per batch
    pub parallel: usize,

    /// Backend used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,

    /// Prompt sent with every image
    pub prompt: String,

    /// Maximum tokens to generate per caption
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            parallel: 4,
            default_backend: Some("gpt-4.1".to_string()),
            prompt: DEFAULT_PROMPT.to_string(),
            max_tokens: 300,
            temperature: 0.3,
        }
    }
}

/// Limits that keep a single request bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Per-request timeout in milliseconds (backends may override)
    pub request_timeout_ms: u64,

    /// Largest image file that will be uploaded, in megabytes
    pub max_file_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 60_000,
            max_file_size_mb: 20,
        }
    }
}

/// Image discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Supported input formats (file extensions)
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_formats: ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// One configured captioning backend.
///
/// `type` selects the implementation; the rest is handed to it at
/// construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type: "openai", "anthropic", "mistral" or "ollama"
    #[serde(rename = "type")]
    pub kind: String,

    /// API base URL (defaults to the provider's public endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Model identifier
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Per-request timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl BackendConfig {
    pub fn new(kind: &str, model: &str) -> Self {
        Self {
            kind: kind.to_string(),
            endpoint: None,
            model: model.to_string(),
            api_key_env: None,
            timeout_ms: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_api_key_env(mut self, var: &str) -> Self {
        self.api_key_env = Some(var.to_string());
        self
    }
}

/// The backends available out of the box.
pub fn default_backends() -> BTreeMap<String, BackendConfig> {
    let mut backends = BTreeMap::new();
    backends.insert(
        "gpt-4.1".to_string(),
        BackendConfig::new("openai", "openai/gpt-4.1")
            .with_endpoint("https://models.github.ai/inference")
            .with_api_key_env("GITHUB_TOKEN"),
    );
    backends.insert(
        "gemini-2.5-flash".to_string(),
        BackendConfig::new("openai", "gemini-2.5-flash")
            .with_endpoint("https://generativelanguage.googleapis.com/v1beta/openai")
            .with_api_key_env("GEMINI_API_KEY"),
    );
    backends.insert(
        "gemini-2.5-pro".to_string(),
        BackendConfig::new("openai", "gemini-2.5-pro")
            .with_endpoint("https://generativelanguage.googleapis.com/v1beta/openai")
            .with_api_key_env("GEMINI_API_KEY"),
    );
    backends.insert(
        "qwen2.5-72b".to_string(),
        BackendConfig::new("openai", "qwen/qwen2.5-vl-72b-instruct:free")
            .with_endpoint("https://openrouter.ai/api/v1")
            .with_api_key_env("OPENROUTER_API_KEY"),
    );
    backends.insert(
        "grok".to_string(),
        BackendConfig::new("openai", "x-ai/grok-4-fast:free")
            .with_endpoint("https://openrouter.ai/api/v1")
            .with_api_key_env("OPENROUTER_API_KEY"),
    );
    backends.insert(
        "pixtral".to_string(),
        BackendConfig::new("mistral", "pixtral-12b-2409").with_api_key_env("MISTRAL_API_KEY"),
    );
    backends.insert(
        "claude-sonnet".to_string(),
        BackendConfig::new("anthropic", "claude-sonnet-4-20250514")
            .with_api_key_env("ANTHROPIC_API_KEY"),
    );
    backends.insert(
        "ollama".to_string(),
        BackendConfig::new("ollama", "llama3.2-vision"),
    );
    backends
}
