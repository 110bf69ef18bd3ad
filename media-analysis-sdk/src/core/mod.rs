//! Core abstractions for the media analysis SDK
//!
//! This module provides the seams between the governor and the outside world:
//!
//! - `AnalysisBackend`: invokes the remote media-analysis function
//! - `AnalysisRequest` / `AnalysisResponse`: the wire contract of that function
//! - `GovernorBuilder`: assembles a governor from a backend, a notifier and config

pub mod builder;
mod models;

pub use builder::GovernorBuilder;
pub use models::{ActionPlanPayload, AnalysisRequest, AnalysisResponse};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Remote media-analysis capability
///
/// Implementations must observe `cancel`: once it fires the returned future
/// should resolve promptly with [`crate::AnalysisError::Cancelled`]. The
/// governor also races the call against the token, so a backend that ignores
/// it only leaks the remote work, never the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Analyze one media item in the context of a checklist question
    async fn analyze_media(
        &self,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<AnalysisResponse>;
}
