//! Common utilities for HTTP backends
//!
//! This module provides shared functionality for the remote analysis clients.

use std::fmt;
use std::time::Duration;
use reqwest::{header, Client};

use crate::error::{Result, AnalysisError, ErrorContext};
use crate::util::sanitize_for_logging;

/// UserAgent structure for identifying the client to upstream services
#[derive(Debug, Clone)]
pub struct UserAgent {
    /// Application name
    pub app_name: String,

    /// Version string
    pub version: String,

    /// Optional extra info
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "Inspection-Analysis".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some("media-analysis-sdk".to_string()),
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// Build a standard HTTP client with default settings
pub fn build_http_client(
    user_agent: Option<UserAgent>,
    timeout: Option<Duration>,
) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    let ua = user_agent.unwrap_or_default().to_string();

    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&ua).map_err(|e| {
            AnalysisError::configuration(format!("Invalid user agent: {}", e))
        })?,
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout.unwrap_or_else(|| Duration::from_secs(40)))
        .gzip(true)
        .build()
        .map_err(|e| {
            AnalysisError::configuration(format!("Failed to build HTTP client: {}", e))
        })
}

/// Create error context for HTTP requests
pub fn create_error_context(
    service_name: &str,
    status: Option<reqwest::StatusCode>,
) -> ErrorContext {
    let mut context = ErrorContext::for_service(service_name);

    if let Some(status_code) = status {
        context = context.status_code(status_code.as_u16());
    }

    context
}

/// Parse error response from HTTP response
pub async fn parse_error_response(
    service_name: &str,
    request_id: &str,
    response: reqwest::Response,
) -> AnalysisError {
    let status = response.status();
    let mut context = create_error_context(service_name, Some(status)).request_id(request_id);

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("Failed to read error response: {}", e),
    };
    log::debug!(
        "{} answered {} ({}) for request {}: {}",
        service_name,
        status,
        crate::error::mapping::classify_http_error(status),
        request_id,
        sanitize_for_logging(&body)
    );

    crate::error::mapping::map_http_error(status, &body, &mut context)
        .with_context(context)
}
