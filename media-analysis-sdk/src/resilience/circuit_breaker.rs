//! Circuit breaker state machine
//!
//! Consecutive failures open the circuit; once the cooldown has elapsed since
//! the last failure the circuit is lazily moved to half-open on the next
//! evaluation, letting a probe through. A single success closes it again.
//!
//! The breaker is a plain value: it owns no locks and reads no clock. Callers
//! pass `now` and keep it inside their own state container.

use std::time::Duration;
use tokio::time::Instant;

use super::CircuitBreakerStatus;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Time since the last failure before a probe is allowed
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Consecutive-failure circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failures: u32,
    last_failure: Option<Instant>,
    state: CircuitBreakerStatus,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            failures: 0,
            last_failure: None,
            state: CircuitBreakerStatus::Closed,
            config,
        }
    }

    /// Apply the lazy OPEN -> HALF_OPEN transition and return the resulting state
    pub fn evaluate(&mut self, now: Instant) -> CircuitBreakerStatus {
        if self.state == CircuitBreakerStatus::Open && self.cooldown_elapsed(now) {
            log::info!(
                "Circuit breaker transitioning to Half-Open state after {} failures",
                self.failures
            );
            self.state = CircuitBreakerStatus::HalfOpen;
        }
        self.state
    }

    /// Evaluate and decide whether a request may proceed
    pub fn allows_request(&mut self, now: Instant, force: bool) -> bool {
        force || self.evaluate(now) != CircuitBreakerStatus::Open
    }

    /// Record a failed request
    pub fn record_failure(&mut self, now: Instant) {
        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(now);

        if self.failures >= self.config.failure_threshold {
            if self.state != CircuitBreakerStatus::Open {
                log::warn!(
                    "Circuit breaker transitioning to Open state ({} consecutive failures)",
                    self.failures
                );
            }
            self.state = CircuitBreakerStatus::Open;
        }
    }

    /// Record a successful request; closes the circuit regardless of prior state
    pub fn record_success(&mut self) {
        if self.state != CircuitBreakerStatus::Closed {
            log::info!("Circuit breaker transitioning to Closed state");
        }
        self.failures = 0;
        self.state = CircuitBreakerStatus::Closed;
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&mut self) {
        self.failures = 0;
        self.last_failure = None;
        self.state = CircuitBreakerStatus::Closed;
    }

    /// State as of the last transition, without evaluating the cooldown
    pub fn status(&self) -> CircuitBreakerStatus {
        self.state
    }

    /// Current number of consecutive failures
    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    /// Time of the most recent failure
    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Time left before a probe is allowed, if the circuit is open
    pub fn remaining_cooldown(&self, now: Instant) -> Option<Duration> {
        if self.state != CircuitBreakerStatus::Open {
            return None;
        }
        let last = self.last_failure?;
        Some(self.config.cooldown.saturating_sub(now.saturating_duration_since(last)))
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.last_failure {
            Some(last) => now.saturating_duration_since(last) > self.config.cooldown,
            None => true,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
