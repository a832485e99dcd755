//! Output record for `--json`.

use captioner_core::{CaptionResult, ErrorKind};
use serde::Serialize;
use std::path::PathBuf;

/// One line of `--json` output.
#[derive(Debug, Serialize)]
pub struct CaptionRecord {
    pub image_path: PathBuf,
    pub caption: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptionRecord {
    /// Build the record for a result, with `save_error` overriding a success
    /// whose caption could not be written.
    pub fn new(result: &CaptionResult, save_error: Option<String>) -> Self {
        let error = save_error.or_else(|| result.error().map(|e| e.to_string()));
        Self {
            image_path: result.image_path().to_path_buf(),
            caption: result.caption().to_string(),
            error_kind: result.error_kind(),
            error,
        }
    }
}
