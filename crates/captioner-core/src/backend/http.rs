//! Shared HTTP plumbing for backends.
//!
//! Sends a request while racing the cancellation token, and maps transport
//! failures and HTTP statuses onto [`ErrorKind`](crate::ErrorKind).

use crate::error::BackendError;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Longest error body excerpt kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Send `request` and decode a JSON response body.
///
/// Returns [`BackendError::cancelled`] as soon as `cancel` fires, dropping the
/// in-flight request. The cancellation branch is polled first so an already
/// fired token never lets the request start.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
    label: &str,
) -> Result<T, BackendError> {
    let exchange = async {
        let resp = request
            .send()
            .await
            .map_err(|e| transport_error(label, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(
                status.as_u16(),
                format!("{label} HTTP {status}: {}", error_detail(&body)),
            ));
        }

        resp.json::<T>()
            .await
            .map_err(|e| BackendError::malformed(format!("Failed to parse {label} response: {e}")))
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BackendError::cancelled()),
        result = exchange => result,
    }
}

/// Classify a transport-level failure.
///
/// Timeouts and connection failures mean the service is unavailable;
/// anything else is unknown.
fn transport_error(label: &str, err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::unavailable(format!("{label} request timed out: {err}"))
    } else if err.is_connect() {
        BackendError::unavailable(format!("{label} connection failed: {err}"))
    } else {
        BackendError::unknown(format!("{label} request failed: {err}"))
    }
}

/// Pull a readable message out of an API error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; falls back to the raw body, truncated.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("error").filter(|e| e.is_string()))
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str());
        if let Some(message) = message {
            return message.to_string();
        }
    }
    body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Strip the trailing slash from a configured base URL.
pub(crate) fn base_url(endpoint: &str) -> &str {
    endpoint.trim_end_matches('/')
}
