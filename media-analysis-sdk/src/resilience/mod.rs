//! Resilience patterns for the analysis governor
//!
//! The governor sheds load with a consecutive-failure circuit breaker. Retries
//! are never issued internally; the caller retries explicitly with a forced
//! request.

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

use serde::Serialize;

/// Status of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerStatus {
    /// Circuit is closed, allowing requests
    Closed,

    /// Circuit is open, rejecting requests
    Open,

    /// Cooldown elapsed, the next request is a probe
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}
