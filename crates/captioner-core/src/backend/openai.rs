//! OpenAI-compatible backend using the Chat Completions API.
//!
//! Covers OpenAI itself and every service that speaks the same protocol
//! (GitHub Models, OpenRouter, Gemini's compatibility endpoint). The image is
//! sent as a data URL in the user message content array.

use super::http::{base_url, send_json};
use super::image::ImageInput;
use super::{Backend, RequestOptions};
use crate::error::{BackendError, ErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Public OpenAI API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Backend for OpenAI-compatible Chat Completions endpoints.
pub struct OpenAiBackend {
    api_key: Option<String>,
    model: String,
    url: String,
    options: RequestOptions,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend for the API rooted at `endpoint`
    /// (e.g. `https://openrouter.ai/api/v1`).
    pub fn new(endpoint: &str, api_key: Option<String>, model: &str, options: RequestOptions) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            url: format!("{}/chat/completions", base_url(endpoint)),
            options,
            client: reqwest::Client::new(),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn kind(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(
        &self,
        image: &Path,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, BackendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::new(ErrorKind::Unauthorized, "OpenAI API key not set"))?;
        let image = ImageInput::load(image, self.options.max_file_bytes).await?;

        let body = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ChatContent::Text {
                        text: prompt.to_string(),
                    },
                    ChatContent::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
        };

        let request = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(self.options.timeout);
        let chat_resp: ChatResponse = send_json(request, cancel, "OpenAI").await?;

        let text = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(BackendError::malformed(
                "OpenAI returned no content for this image",
            ));
        }
        Ok(text)
    }
}
