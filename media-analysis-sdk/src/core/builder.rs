//! Governor builder implementation
//!
//! Assembles a [`MediaAnalysisGovernor`] (and optionally its sequential queue)
//! from a backend, a notifier and configuration.

use std::sync::Arc;

use crate::analysis::{MediaAnalysisGovernor, SequentialAnalysisQueue};
use crate::config::{ConfigProvider, GovernorConfig, SequentialConfig, ServiceConfig};
use crate::core::AnalysisBackend;
use crate::error::{AnalysisError, Result};
use crate::notify::{LogNotifier, Notifier};
use crate::resilience::CircuitBreakerConfig;

/// Builder for the analysis governor
pub struct GovernorBuilder {
    backend: Option<Arc<dyn AnalysisBackend>>,
    notifier: Option<Arc<dyn Notifier>>,
    config: GovernorConfig,
    sequential: SequentialConfig,
}

impl Default for GovernorBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            notifier: None,
            config: GovernorConfig::default(),
            sequential: SequentialConfig::default(),
        }
    }
}

impl GovernorBuilder {
    /// Create a new builder with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Load governor and sequential settings from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        Ok(Self {
            config: GovernorConfig::from_provider(provider)?,
            sequential: SequentialConfig::from_provider(provider),
            ..Self::default()
        })
    }

    /// Set the remote analysis backend
    pub fn backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the user notification sink (defaults to the log)
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the governor configuration
    pub fn config(mut self, config: GovernorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of distinct requests in flight
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    /// Configure the circuit breaker
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Configure sequential batches
    pub fn sequential(mut self, config: SequentialConfig) -> Self {
        self.sequential = config;
        self
    }

    /// Build the governor
    pub fn build(self) -> Result<MediaAnalysisGovernor> {
        self.build_parts().map(|(governor, _)| governor)
    }

    /// Build the governor wrapped in a sequential queue
    pub fn build_sequential(self) -> Result<SequentialAnalysisQueue> {
        let (governor, sequential) = self.build_parts()?;
        Ok(SequentialAnalysisQueue::new(governor, sequential))
    }

    fn build_parts(self) -> Result<(MediaAnalysisGovernor, SequentialConfig)> {
        let backend = self
            .backend
            .ok_or_else(|| AnalysisError::configuration("An analysis backend is required"))?;
        self.config.validate()?;

        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LogNotifier));
        Ok((MediaAnalysisGovernor::new(backend, notifier, self.config), self.sequential))
    }
}
