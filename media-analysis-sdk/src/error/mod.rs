//! Error handling for the media analysis SDK
//!
//! This module provides the error taxonomy surfaced by the governor:
//! - Admission errors (invalid input, circuit open, queue full, duplicates)
//! - Execution errors (timeout, cancellation, rate limiting, remote failures)
//! - Transport and configuration errors from the HTTP backend
//! - Rich context attached to errors for debugging

use std::fmt;
use std::collections::HashMap;
use thiserror::Error;

pub mod mapping;

/// Result type for media analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Main error type for the media analysis SDK
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The request was rejected before admission (e.g. empty media URL)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The circuit breaker is open and the request was not forced
    #[error("Analysis temporarily unavailable: {0}")]
    Unavailable(String),

    /// Every concurrency slot is taken
    #[error("Analysis queue full: {0}")]
    Overloaded(String),

    /// The same logical request is already queued or has failed
    #[error("Duplicate request: {0}")]
    Duplicate(String),

    /// The request outlived its deadline
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The request was cancelled by the caller or evicted by the watchdog
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A newer admission of the same key replaced this request
    #[error("Superseded: {0}")]
    Superseded(String),

    /// The remote function is throttling us
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// The remote function failed or answered with an unusable body
    #[error("Remote analysis error: {0}")]
    Remote(String),

    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Response parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<AnalysisError>,
        context: ErrorContext,
    },
}

/// Discriminant of an [`AnalysisError`], looking through context wrappers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Unavailable,
    Overloaded,
    Duplicate,
    Timeout,
    Cancelled,
    Superseded,
    RateLimit,
    Remote,
    Network,
    Authentication,
    Parsing,
    Configuration,
    Internal,
}

impl AnalysisError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AnalysisError::InvalidInput(message.into())
    }

    /// Create a circuit-open error
    pub fn unavailable(message: impl Into<String>) -> Self {
        AnalysisError::Unavailable(message.into())
    }

    /// Create a queue-full error
    pub fn overloaded(message: impl Into<String>) -> Self {
        AnalysisError::Overloaded(message.into())
    }

    /// Create a duplicate request error
    pub fn duplicate(message: impl Into<String>) -> Self {
        AnalysisError::Duplicate(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        AnalysisError::Timeout(message.into())
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        AnalysisError::Cancelled(message.into())
    }

    /// Create a superseded error
    pub fn superseded(message: impl Into<String>) -> Self {
        AnalysisError::Superseded(message.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>) -> Self {
        AnalysisError::RateLimit(message.into())
    }

    /// Create a remote failure error
    pub fn remote(message: impl Into<String>) -> Self {
        AnalysisError::Remote(message.into())
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        AnalysisError::Network(message.into())
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        AnalysisError::Authentication(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        AnalysisError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        AnalysisError::Configuration(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        AnalysisError::Internal(message.into())
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        AnalysisError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// The error kind, ignoring any context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalysisError::Unavailable(_) => ErrorKind::Unavailable,
            AnalysisError::Overloaded(_) => ErrorKind::Overloaded,
            AnalysisError::Duplicate(_) => ErrorKind::Duplicate,
            AnalysisError::Timeout(_) => ErrorKind::Timeout,
            AnalysisError::Cancelled(_) => ErrorKind::Cancelled,
            AnalysisError::Superseded(_) => ErrorKind::Superseded,
            AnalysisError::RateLimit(_) => ErrorKind::RateLimit,
            AnalysisError::Remote(_) => ErrorKind::Remote,
            AnalysisError::Network(_) => ErrorKind::Network,
            AnalysisError::Authentication(_) => ErrorKind::Authentication,
            AnalysisError::Parsing(_) => ErrorKind::Parsing,
            AnalysisError::Configuration(_) => ErrorKind::Configuration,
            AnalysisError::Internal(_) => ErrorKind::Internal,
            AnalysisError::WithContext { inner, .. } => inner.kind(),
        }
    }

    /// The message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            AnalysisError::InvalidInput(m)
            | AnalysisError::Unavailable(m)
            | AnalysisError::Overloaded(m)
            | AnalysisError::Duplicate(m)
            | AnalysisError::Timeout(m)
            | AnalysisError::Cancelled(m)
            | AnalysisError::Superseded(m)
            | AnalysisError::RateLimit(m)
            | AnalysisError::Remote(m)
            | AnalysisError::Network(m)
            | AnalysisError::Authentication(m)
            | AnalysisError::Parsing(m)
            | AnalysisError::Configuration(m)
            | AnalysisError::Internal(m) => m,
            AnalysisError::WithContext { inner, .. } => inner.message(),
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AnalysisError::WithContext { context, inner } => {
                context.status_code.or_else(|| inner.status_code())
            }
            _ => None,
        }
    }

    /// Get the request ID if available
    pub fn request_id(&self) -> Option<&str> {
        match self {
            AnalysisError::WithContext { context, inner } => {
                context.request_id.as_deref().or_else(|| inner.request_id())
            }
            _ => None,
        }
    }

    /// Errors the caller should never be told about
    pub fn is_silent(&self) -> bool {
        matches!(self.kind(), ErrorKind::Duplicate | ErrorKind::Superseded)
    }

    /// Whether the error happened after the request was admitted
    pub fn is_execution_failure(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::InvalidInput
                | ErrorKind::Unavailable
                | ErrorKind::Overloaded
                | ErrorKind::Duplicate
                | ErrorKind::Superseded
        )
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// Time the error was observed
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Analysis request ID
    pub request_id: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            request_id: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add a request ID
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    /// Add a context value and return self (builder pattern)
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.add(key, value);
        self
    }
}

/// Convert reqwest errors to AnalysisError
impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        let context = ErrorContext::for_service("http_client");

        let analysis_error = if err.is_timeout() {
            AnalysisError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            AnalysisError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            AnalysisError::network(format!("Request failed: {}", err))
        } else if err.is_decode() {
            AnalysisError::parsing(format!("Response decode error: {}", err))
        } else {
            AnalysisError::internal(format!("HTTP client error: {}", err))
        };

        if let Some(status) = err.status() {
            analysis_error.with_context(context.status_code(status.as_u16()))
        } else {
            analysis_error.with_context(context)
        }
    }
}

/// Convert serde_json errors to AnalysisError
impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
