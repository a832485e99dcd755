//! Anthropic backend using the Messages API.
//!
//! Sends image + prompt with base64 image content blocks.

use super::http::{base_url, send_json};
use super::image::ImageInput;
use super::{Backend, RequestOptions};
use crate::error::{BackendError, ErrorKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Public Anthropic API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Backend for the Anthropic Messages API.
pub struct AnthropicBackend {
    api_key: Option<String>,
    model: String,
    url: String,
    options: RequestOptions,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(endpoint: &str, api_key: Option<String>, model: &str, options: RequestOptions) -> Self {
        Self {
            api_key,
            model: model.to_string(),
            url: format!("{}/messages", base_url(endpoint)),
            options,
            client: reqwest::Client::new(),
        }
    }
}

// --- Request types ---

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "image")]
    Image { source: ImageSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

#[async_trait]
impl Backend for AnthropicBackend {
    fn kind(&self) -> &str {
        "anthropic"
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
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            BackendError::new(ErrorKind::Unauthorized, "Anthropic API key not set")
        })?;
        let image = ImageInput::load(image, self.options.max_file_bytes).await?;

        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: Some(self.options.temperature),
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: image.media_type,
                            data: image.data,
                        },
                    },
                    ContentBlock::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
        };

        let request = self
            .client
            .post(&self.url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .timeout(self.options.timeout);
        let messages_resp: MessagesResponse = send_json(request, cancel, "Anthropic").await?;

        let text = messages_resp
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(BackendError::malformed(
                "Anthropic returned no text content for this image",
            ));
        }
        Ok(text)
    }
}
