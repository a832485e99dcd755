//! Ollama backend for local vision model inference.
//!
//! Talks to a local Ollama instance via its HTTP API.
//! No authentication required — just needs Ollama running locally.

use super::http::{base_url, send_json};
use super::image::ImageInput;
use super::{Backend, RequestOptions};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Default local Ollama address.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Backend for a local Ollama server.
pub struct OllamaBackend {
    url: String,
    model: String,
    options: RequestOptions,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(endpoint: &str, model: &str, options: RequestOptions) -> Self {
        Self {
            url: format!("{}/api/generate", base_url(endpoint)),
            model: model.to_string(),
            options,
            client: reqwest::Client::new(),
        }
    }
}

/// Ollama /api/generate request body.
#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama /api/generate response.
#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl Backend for OllamaBackend {
    fn kind(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    // No credential to check, and probing the server would block.
    fn is_available(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        image: &Path,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        let image = ImageInput::load(image, self.options.max_file_bytes).await?;

        let body = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: vec![image.data],
            stream: false,
            options: OllamaOptions {
                temperature: self.options.temperature,
                num_predict: self.options.max_tokens,
            },
        };

        let request = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(self.options.timeout);
        let ollama_resp: OllamaResponse = send_json(request, cancel, "Ollama").await?;

        let text = ollama_resp.response.trim().to_string();
        if text.is_empty() {
            return Err(BackendError::malformed(
                "Ollama returned empty response — no content generated",
            ));
        }
        Ok(text)
    }
}
