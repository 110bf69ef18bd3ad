//! # Media Analysis SDK
//!
//! Client-side orchestration of AI analysis for inspection media.
//!
//! This crate provides:
//!
//! - A request governor that deduplicates, bounds and times out calls to the
//!   remote media-analysis function, guarded by a circuit breaker
//! - A sequential queue that analyzes a batch of media one item at a time
//! - Normalization of raw analysis answers into conformity verdicts and
//!   5W2H action plans
//! - An HTTP backend for the hosted analysis function
//! - A debounced auto-saver for inspection drafts
//!
//! ## Architecture
//!
//! - `AnalysisBackend`: the seam to the remote analysis function
//! - `MediaAnalysisGovernor`: admission control and request lifecycle
//! - `SequentialAnalysisQueue`: one-at-a-time batches over the governor
//! - `Notifier`: user-facing toasts for outcomes
//! - `AnalysisError`: the error taxonomy shared by all of the above

pub mod core;
pub use core::{AnalysisBackend, AnalysisRequest, AnalysisResponse, GovernorBuilder};

pub mod analysis;
pub use analysis::{
    AnalysisOptions, AnalysisQueueSnapshot, MediaAnalysisGovernor, MediaAnalysisResult, MediaType,
    SequentialAnalysisQueue, SequentialAnalysisState,
};

pub mod services;
pub use services::EdgeFunctionClient;

pub mod error;
pub use error::{AnalysisError, ErrorContext, ErrorKind, Result};

pub mod resilience;
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus};

pub mod config;
pub use config::{ConfigProvider, ServiceConfig};

pub mod notify;
pub use notify::{ChannelNotifier, LogNotifier, Notification, Notifier};

pub mod autosave;
pub use autosave::{AutoSaveStatus, AutoSaver, DraftStore};

mod util;

#[cfg(test)]
mod tests;

/// Create a new default governor builder
pub fn governor() -> core::GovernorBuilder {
    core::GovernorBuilder::new()
}
