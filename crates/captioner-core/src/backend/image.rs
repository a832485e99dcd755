//! Image payloads for vision APIs.

use crate::error::BackendError;
use base64::Engine;
use std::path::Path;

/// Base64-encoded image ready to send to a vision API.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Create an `ImageInput` from raw bytes and a format string.
    ///
    /// The format is the file extension without the dot (e.g., "jpeg", "png").
    pub fn from_bytes(bytes: &[u8], format: &str) -> Self {
        let media_type = match format.to_lowercase().as_str() {
            "jpeg" | "jpg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            other => {
                tracing::warn!("Unknown image format '{other}', defaulting to image/jpeg");
                "image/jpeg"
            }
        };

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type: media_type.to_string(),
        }
    }

    /// Read and encode an image file, refusing files above `max_bytes`.
    ///
    /// Unreadable files are reported as unknown errors; oversized files as
    /// malformed input, since no backend would accept them.
    pub async fn load(path: &Path, max_bytes: u64) -> Result<Self, BackendError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            BackendError::unknown(format!("Failed to read image {}: {e}", path.display()))
        })?;
        if metadata.len() > max_bytes {
            return Err(BackendError::malformed(format!(
                "Image {} is too large ({} bytes > {} bytes)",
                path.display(),
                metadata.len(),
                max_bytes
            )));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            BackendError::unknown(format!("Failed to read image {}: {e}", path.display()))
        })?;
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Ok(Self::from_bytes(&bytes, format))
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}
