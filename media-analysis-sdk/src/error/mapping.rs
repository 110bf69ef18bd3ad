//! Error mapping for the remote analysis function
//!
//! Converts HTTP status codes and error bodies returned by the serverless
//! analysis endpoint into the normalized [`AnalysisError`] taxonomy.

use reqwest::StatusCode;
use serde_json::Value;

use super::{AnalysisError, ErrorContext};

/// Extract a human readable message from an error body
///
/// Edge functions answer with either `{"error": "..."}`,
/// `{"error": {"message": "..."}}` or `{"message": "..."}`.
pub fn extract_error_message(json: &Value) -> Option<String> {
    match json.get("error") {
        Some(Value::String(message)) if !message.is_empty() => return Some(message.clone()),
        Some(Value::Object(error)) => {
            if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                return Some(message.to_string());
            }
        }
        _ => {}
    }

    json.get("message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Map an analysis function failure to an AnalysisError
///
/// A rejected payload (400/422) is a remote failure; `InvalidInput` is only
/// raised by admission.
pub fn map_analysis_error(status: StatusCode, message: String) -> AnalysisError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::rate_limit(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AnalysisError::authentication(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AnalysisError::timeout(message),
        _ => AnalysisError::remote(message),
    }
}

/// Map a generic HTTP error response to an AnalysisError
pub fn map_http_error(
    status: StatusCode,
    body: &str,
    context: &mut ErrorContext,
) -> AnalysisError {
    context.status_code = Some(status.as_u16());

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(code) = json.get("code").and_then(|c| c.as_str()) {
            context.add("error_code", code);
        }
        if let Some(message) = extract_error_message(&json) {
            return map_analysis_error(status, message);
        }
    }

    let message = if body.is_empty() {
        status.to_string()
    } else if body.len() > 100 {
        format!("{}: {}", status, crate::util::truncate_string(body, 100))
    } else {
        format!("{}: {}", status, body)
    };

    map_analysis_error(status, message)
}

/// Whether a free-form error message describes remote throttling
///
/// Some gateways return throttling errors with a 200/500 status and only say
/// so in the message.
pub fn mentions_rate_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("429")
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 | 403 => "authentication",
        408 | 504 => "timeout",
        429 => "rate_limit",
        400 | 422 | 500..=599 => "remote",
        _ => "unknown",
    }
}
