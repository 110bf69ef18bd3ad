//! One-at-a-time analysis of a batch of media items
//!
//! Drives the governor over a list of media URLs for a single question, never
//! overlapping two remote calls and pausing between items to stay clear of
//! the analysis function's rate limits.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{AnalysisOptions, MediaAnalysisGovernor, MediaAnalysisResult};
use crate::config::SequentialConfig;
use crate::error::Result;

/// Progress of a sequential batch
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialAnalysisState {
    pub pending: Vec<String>,
    pub processing: Option<String>,
    pub completed: BTreeMap<String, MediaAnalysisResult>,
    pub failed: BTreeMap<String, String>,
}

impl SequentialAnalysisState {
    fn with_pending(media_urls: &[String]) -> Self {
        Self {
            pending: media_urls.to_vec(),
            ..Self::default()
        }
    }

    /// No item is waiting or running
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.processing.is_none()
    }

    pub fn has_results(&self) -> bool {
        !self.completed.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total_processed(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    fn start(&mut self, media_url: &str) {
        if let Some(position) = self.pending.iter().position(|url| url == media_url) {
            self.pending.remove(position);
        }
        self.processing = Some(media_url.to_string());
    }

    fn finish(&mut self, media_url: &str, outcome: std::result::Result<MediaAnalysisResult, String>) {
        match outcome {
            Ok(result) => {
                self.failed.remove(media_url);
                self.completed.insert(media_url.to_string(), result);
            }
            Err(message) => {
                self.completed.remove(media_url);
                self.failed.insert(media_url.to_string(), message);
            }
        }
        self.processing = None;
    }

    fn fail_pending(&mut self, message: &str) {
        for media_url in std::mem::take(&mut self.pending) {
            self.failed.insert(media_url, message.to_string());
        }
    }
}

/// Sequential wrapper around a [`MediaAnalysisGovernor`]
pub struct SequentialAnalysisQueue {
    governor: MediaAnalysisGovernor,
    config: SequentialConfig,
    state: watch::Sender<SequentialAnalysisState>,
    batch_lock: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl SequentialAnalysisQueue {
    pub fn new(governor: MediaAnalysisGovernor, config: SequentialConfig) -> Self {
        let (state, _) = watch::channel(SequentialAnalysisState::default());
        Self {
            governor,
            config,
            state,
            batch_lock: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn governor(&self) -> &MediaAnalysisGovernor {
        &self.governor
    }

    /// Current progress
    pub fn state(&self) -> SequentialAnalysisState {
        self.state.borrow().clone()
    }

    /// Progress updates, one per state transition
    pub fn subscribe(&self) -> watch::Receiver<SequentialAnalysisState> {
        self.state.subscribe()
    }

    /// Analyze `media_urls` in order, one at a time
    ///
    /// Returns the final state. Batches on the same queue never overlap; a
    /// second call waits for the first to finish.
    #[tracing::instrument(level = "debug", skip(self, media_urls, user_answer), fields(items = media_urls.len()))]
    pub async fn analyze_sequentially(
        &self,
        media_urls: &[String],
        question_text: &str,
        user_answer: Option<&str>,
    ) -> SequentialAnalysisState {
        let _batch = self.batch_lock.lock().await;
        let cancel = self.fresh_cancel_token();

        self.state.send_replace(SequentialAnalysisState::with_pending(media_urls));
        log::info!("Starting sequential analysis of {} media item(s)", media_urls.len());

        for (index, media_url) in media_urls.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Sequential analysis cancelled, {} item(s) skipped", media_urls.len() - index);
                self.state.send_modify(|state| state.fail_pending("cancelled"));
                break;
            }

            self.state.send_modify(|state| state.start(media_url));

            let mut options = AnalysisOptions::new(media_url.clone(), question_text);
            options.user_answer = user_answer.map(str::to_string);
            let outcome = self.governor.analyze_with_outcome(options).await;
            self.record(media_url, outcome);

            if index + 1 < media_urls.len() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.inter_item_delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        let state = self.state();
        log::info!(
            "Sequential analysis finished: {} completed, {} failed",
            state.completed.len(),
            state.failed.len()
        );
        state
    }

    /// Retry one failed item with a forced request
    pub async fn retry_failed_analysis(
        &self,
        media_url: &str,
        question_text: &str,
        user_answer: Option<&str>,
    ) -> Option<MediaAnalysisResult> {
        let _batch = self.batch_lock.lock().await;

        self.state.send_modify(|state| {
            state.failed.remove(media_url);
            state.processing = Some(media_url.to_string());
        });

        let mut options = AnalysisOptions::new(media_url, question_text).forced();
        options.user_answer = user_answer.map(str::to_string);
        let outcome = self.governor.analyze_with_outcome(options).await;
        let result = outcome.as_ref().ok().cloned();
        self.record(media_url, outcome);
        result
    }

    /// Stop the running batch after its current item
    pub fn cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Forget all progress
    pub fn reset(&self) {
        self.state.send_replace(SequentialAnalysisState::default());
    }

    fn record(&self, media_url: &str, outcome: Result<MediaAnalysisResult>) {
        let outcome = outcome.map_err(|error| error.to_string());
        self.state.send_modify(|state| state.finish(media_url, outcome));
    }

    fn fresh_cancel_token(&self) -> CancellationToken {
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        *current = CancellationToken::new();
        current.clone()
    }
}
