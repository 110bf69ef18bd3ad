//! Serverless analysis function client
//!
//! Invokes the hosted media-analysis function over HTTP, authenticating with
//! the project key, and maps its answers and failures onto the SDK types.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{AnalysisServiceConfig, ConfigProvider, ServiceConfig};
use crate::core::{AnalysisBackend, AnalysisRequest, AnalysisResponse};
use crate::error::{mapping, AnalysisError, ErrorContext, Result};
use crate::services::common::{build_http_client, parse_error_response, UserAgent};

const SERVICE_NAME: &str = "analysis_function";

/// HTTP client for the media-analysis function
pub struct EdgeFunctionClient {
    http_client: Client,
    config: AnalysisServiceConfig,
}

impl EdgeFunctionClient {
    /// Create a client from validated configuration
    pub fn new(config: AnalysisServiceConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(
            Some(UserAgent {
                extra: Some("edge-function-client".to_string()),
                ..UserAgent::default()
            }),
            Some(Duration::from_secs(config.http_timeout_seconds)),
        )?;

        Ok(Self { http_client, config })
    }

    /// Create a client from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        Self::new(AnalysisServiceConfig::from_provider(provider)?)
    }

    pub fn config(&self) -> &AnalysisServiceConfig {
        &self.config
    }

    async fn invoke(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let endpoint = self.config.endpoint();
        debug!("Invoking analysis function: POST {} ({})", endpoint, request.request_id);

        let response = self
            .http_client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .header("apikey", &self.config.api_key)
            .header("x-request-id", &request.request_id)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = parse_error_response(SERVICE_NAME, &request.request_id, response).await;
            warn!("Analysis function rejected request {}: {}", request.request_id, error);
            return Err(error);
        }

        let context = || {
            ErrorContext::for_service(SERVICE_NAME)
                .status_code(status.as_u16())
                .request_id(request.request_id.clone())
                .endpoint(endpoint.clone())
        };

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(AnalysisError::remote("analysis function returned an empty body").with_context(context()));
        }

        let value: Value = serde_json::from_str(&body)?;
        if value.get("error").map_or(false, |e| !e.is_null()) {
            let message = mapping::extract_error_message(&value)
                .unwrap_or_else(|| "analysis function reported an error".to_string());
            let error = if mapping::mentions_rate_limit(&message) {
                AnalysisError::rate_limit(message)
            } else {
                AnalysisError::remote(message)
            };
            return Err(error.with_context(context()));
        }

        AnalysisResponse::from_value(value)
    }
}

#[async_trait]
impl AnalysisBackend for EdgeFunctionClient {
    async fn analyze_media(
        &self,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<AnalysisResponse> {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Analysis request {} cancelled in flight", request.request_id);
                Err(AnalysisError::cancelled(format!("request {} aborted", request.request_id)))
            }
            response = self.invoke(request) => response,
        }
    }
}
