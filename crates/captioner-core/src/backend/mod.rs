//! Captioning backends.
//!
//! A backend turns an image and a prompt into caption text by calling a
//! remote vision model. All backends implement [`Backend`]; the
//! [`BackendFactory`] builds the right one from a `[backends.<name>]` config
//! entry.

mod anthropic;
mod factory;
mod http;
mod image;
mod mistral;
mod ollama;
mod openai;

pub use anthropic::AnthropicBackend;
pub use factory::{resolve_credential, BackendFactory};
pub use image::ImageInput;
pub use mistral::MistralBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use crate::error::BackendError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait that all captioning backends implement.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (the registry stores `Arc<dyn Backend>`).
///
/// Implementations must not retry internally, must bound every network call
/// with a timeout, and must return [`BackendError::cancelled`] promptly once
/// `cancel` fires.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend type for logging (e.g., "openai", "ollama").
    fn kind(&self) -> &str;

    /// Model identifier sent to the service.
    fn model(&self) -> &str;

    /// Whether the backend can be called at all. Must be cheap and must not
    /// touch the network.
    fn is_available(&self) -> bool;

    /// Generate a caption for the image at `image`.
    async fn generate(
        &self,
        image: &Path,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError>;
}

/// Request settings shared by every HTTP backend.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Largest image file that will be uploaded
    pub max_file_bytes: u64,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
            max_file_bytes: 20 * 1024 * 1024,
        }
    }
}
