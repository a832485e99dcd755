//! Error types for caption generation.
//!
//! Errors are organized by where they surface. Pre-flight failures (unknown
//! backend, missing credentials, a path that is already being captioned) are
//! returned directly to the caller. Failures raised while a backend call is
//! running never cross the task boundary as errors: they travel inside the
//! [`CaptionResult`](crate::CaptionResult) for that image.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Captioner operations.
#[derive(Error, Debug)]
pub enum CaptionerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Registry and generation errors
    #[error("Caption error: {0}")]
    Caption(#[from] CaptionError),

    /// General I/O errors (discovery, caption storage)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Classification of failures raised by a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials were rejected (HTTP 401/403)
    Unauthorized,
    /// The service asked us to slow down (HTTP 429)
    RateLimited,
    /// The service could not be reached or is failing (timeouts, 5xx)
    Unavailable,
    /// The call was cancelled before it produced a caption
    Cancelled,
    /// The response could not be turned into caption text
    Malformed,
    /// Anything else
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// An error raised while a backend was generating a caption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    /// What went wrong, coarsely
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
    /// HTTP status code, when the failure came from an HTTP response
    pub status_code: Option<u16>,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "caption request was cancelled")
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Classify a non-success HTTP response.
    ///
    /// 401/403 are auth failures, 429 is rate limiting, 408 and 5xx mean the
    /// service is unavailable. Any other status is reported as unknown.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => ErrorKind::Unauthorized,
            429 => ErrorKind::RateLimited,
            408 | 500..=599 => ErrorKind::Unavailable,
            _ => ErrorKind::Unknown,
        };
        Self {
            kind,
            message: message.into(),
            status_code: Some(status),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// Registry and generation-manager errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptionError {
    /// No backend is registered under this name
    #[error("Backend not found: {0}")]
    NotFound(String),

    /// A backend with this name was already registered
    #[error("Backend already registered: {0}")]
    DuplicateName(String),

    /// The backend exists but cannot be used (credentials or config missing)
    #[error("Backend {0} is not available (check its credentials)")]
    BackendUnavailable(String),

    /// A caption request for this path is still outstanding
    #[error("Caption already in progress for {}", .0.display())]
    AlreadyInFlight(PathBuf),

    /// The configured backend type has no implementation
    #[error("Unknown backend type '{kind}' for backend {name}")]
    UnknownBackendType { name: String, kind: String },

    /// The backend call itself failed
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CaptionError {
    /// The backend error kind, if this error came from a backend call.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CaptionError::Backend(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Convenience type alias for Captioner results.
pub type Result<T> = std::result::Result<T, CaptionerError>;
