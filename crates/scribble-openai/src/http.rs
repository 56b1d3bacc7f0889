//! Shared HTTP response helpers
//!
//! Maps status codes and transport failures onto [`CapabilityError`] so the
//! capability implementations only deal with request construction and body
//! decoding.

use scribble_core::CapabilityError;
use serde::Deserialize;

/// OpenAI error code for prompts rejected by the safety system
pub const CONTENT_POLICY_CODE: &str = "content_policy_violation";

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Check a response for error statuses
///
/// Returns the response unchanged on success. Handles:
/// - **429** → `RateLimited` with the `Retry-After` seconds, when given
/// - **content-policy error bodies** → `ContentPolicy`
/// - **any other non-success** → `Transport` with status and message
///
/// # Errors
/// The mapped [`CapabilityError`] for non-success statuses
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CapabilityError> {
    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CapabilityError::RateLimited {
            retry_after_secs: parse_retry_after(&resp),
        });
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(classify_error(status.as_u16(), &body));
    }
    Ok(resp)
}

/// Parse `Retry-After` as whole seconds
fn parse_retry_after(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Map an error status and body onto a capability failure
#[must_use]
pub fn classify_error(status: u16, body: &str) -> CapabilityError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = if parsed.error.message.is_empty() {
        body.trim().chars().take(200).collect()
    } else {
        parsed.error.message
    };

    let policy = parsed.error.code.as_deref() == Some(CONTENT_POLICY_CODE)
        || message.to_lowercase().contains("safety system");
    if policy {
        return CapabilityError::ContentPolicy(message);
    }
    CapabilityError::Transport(format!("HTTP {status}: {message}"))
}

/// Map a reqwest failure onto a capability failure
#[must_use]
pub fn map_transport_error(error: &reqwest::Error) -> CapabilityError {
    if error.is_timeout() {
        CapabilityError::Timeout
    } else if error.is_decode() {
        CapabilityError::Malformed(error.to_string())
    } else {
        CapabilityError::Transport(error.to_string())
    }
}
