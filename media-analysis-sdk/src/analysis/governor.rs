//! Media analysis request governor
//!
//! Admits at most one in-flight request per [`AnalysisRequestKey`], caps the
//! number of distinct keys in flight, bounds every remote call with a
//! deadline, and sheds load through a circuit breaker while the analysis
//! function is unhealthy. A background watchdog evicts requests that outlive
//! their deadline and repairs an `analyzing` flag left without work.
//!
//! All bookkeeping lives in one [`AnalysisQueueState`] behind a mutex that is
//! only ever touched through `update_state`, and never held across an await.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{AnalysisRequestKey, MediaAnalysisResult, MediaType};
use crate::config::GovernorConfig;
use crate::core::{AnalysisBackend, AnalysisRequest};
use crate::error::{mapping, AnalysisError, ErrorKind, Result};
use crate::notify::{Notification, Notifier};
use crate::resilience::{CircuitBreaker, CircuitBreakerStatus};
use crate::util::generate_request_id;

/// Parameters of one analysis call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub media_url: String,
    pub question_text: String,
    pub user_answer: Option<String>,
    /// Bypass the open circuit and the failure cache
    pub force_retry: bool,
}

impl AnalysisOptions {
    pub fn new(media_url: impl Into<String>, question_text: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
            question_text: question_text.into(),
            ..Self::default()
        }
    }

    pub fn with_answer(mut self, user_answer: impl Into<String>) -> Self {
        self.user_answer = Some(user_answer.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force_retry = true;
        self
    }

    pub fn key(&self) -> AnalysisRequestKey {
        AnalysisRequestKey::new(&self.media_url, &self.question_text, self.user_answer.as_deref())
    }
}

/// Bookkeeping for an admitted request
#[derive(Debug, Clone)]
pub struct ActiveRequestRecord {
    pub start_time: Instant,
    pub attempt: u32,
    /// Admission generation; a forced retry of the same key gets a new one
    pub request_id: String,
}

/// Why a request was taken out of the queue by someone other than itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retirement {
    /// The watchdog found it stuck past its deadline
    Evicted,
    /// `reset_all_state` dropped it; its outcome is not recorded
    Discarded,
}

/// Aggregate state of the governor
#[derive(Debug)]
pub struct AnalysisQueueState {
    analyzing: bool,
    request_queue: HashSet<AnalysisRequestKey>,
    failed_requests: HashSet<AnalysisRequestKey>,
    abort_handles: HashMap<AnalysisRequestKey, CancellationToken>,
    active_requests: HashMap<AnalysisRequestKey, ActiveRequestRecord>,
    circuit_breaker: CircuitBreaker,
    last_heartbeat: Instant,
    retired: HashMap<String, Retirement>,
    watchdog: Option<CancellationToken>,
}

impl AnalysisQueueState {
    fn new(config: &GovernorConfig) -> Self {
        Self {
            analyzing: false,
            request_queue: HashSet::new(),
            failed_requests: HashSet::new(),
            abort_handles: HashMap::new(),
            active_requests: HashMap::new(),
            circuit_breaker: CircuitBreaker::new(config.circuit_breaker.clone()),
            last_heartbeat: Instant::now(),
            retired: HashMap::new(),
            watchdog: None,
        }
    }

    /// Re-establish `analyzing == !request_queue.is_empty()` and stop the
    /// watchdog once idle
    fn sync_analyzing(&mut self) {
        self.analyzing = !self.request_queue.is_empty();
        if !self.analyzing {
            if let Some(watchdog) = self.watchdog.take() {
                watchdog.cancel();
            }
        }
    }

    fn remove_request(&mut self, key: &AnalysisRequestKey) {
        self.request_queue.remove(key);
        self.abort_handles.remove(key);
        self.active_requests.remove(key);
    }

    /// Abort every in-flight request and forget it
    fn clear_in_flight(&mut self, retirement: Option<Retirement>) {
        for token in self.abort_handles.values() {
            token.cancel();
        }
        if let Some(retirement) = retirement {
            for record in self.active_requests.values() {
                self.retired.insert(record.request_id.clone(), retirement);
            }
        }
        self.request_queue.clear();
        self.abort_handles.clear();
        self.active_requests.clear();
        self.sync_analyzing();
    }

    fn owns(&self, key: &AnalysisRequestKey, request_id: &str) -> Option<bool> {
        self.active_requests
            .get(key)
            .map(|record| record.request_id == request_id)
    }
}

/// Read-only view of the governor state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisQueueSnapshot {
    pub analyzing: bool,
    pub queued: Vec<String>,
    pub failed: Vec<String>,
    pub active_requests: usize,
    pub abort_handles: usize,
    pub circuit_state: CircuitBreakerStatus,
    pub circuit_failures: u32,
}

struct GovernorInner {
    backend: Arc<dyn AnalysisBackend>,
    notifier: Arc<dyn Notifier>,
    config: GovernorConfig,
    state: Mutex<AnalysisQueueState>,
}

impl GovernorInner {
    /// The single mutation entry point for the governor state
    fn update_state<R>(&self, transform: impl FnOnce(&mut AnalysisQueueState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        transform(&mut state)
    }

    /// One watchdog pass; returns whether analysis is still active
    fn watchdog_tick(&self, now: Instant) -> bool {
        let stuck_after = self.config.stuck_after();
        self.update_state(|state| {
            state.last_heartbeat = now;

            let stuck: Vec<AnalysisRequestKey> = state
                .active_requests
                .iter()
                .filter(|(_, record)| now.saturating_duration_since(record.start_time) > stuck_after)
                .map(|(key, _)| key.clone())
                .collect();

            for key in &stuck {
                log::warn!("Evicting analysis request stuck for more than {:?}: {}", stuck_after, key);
                if let Some(token) = state.abort_handles.get(key) {
                    token.cancel();
                }
                if let Some(record) = state.active_requests.get(key) {
                    state.retired.insert(record.request_id.clone(), Retirement::Evicted);
                }
                state.remove_request(key);
            }

            if state.analyzing && state.request_queue.is_empty() && state.active_requests.is_empty() {
                log::warn!("Analysis flagged as running with nothing in flight, clearing");
            }

            // queue entries without an active record cannot complete on their own
            let orphans: Vec<AnalysisRequestKey> = state
                .request_queue
                .iter()
                .filter(|key| !state.active_requests.contains_key(*key))
                .cloned()
                .collect();
            for key in &orphans {
                log::warn!("Dropping orphaned queue entry: {}", key);
                state.remove_request(key);
            }

            state.sync_analyzing();
            state.analyzing
        })
    }
}

/// Outcome of the admission checks
struct Admission {
    token: CancellationToken,
    request_id: String,
    watchdog: Option<CancellationToken>,
}

/// Cleans up an admitted request when it completes or its future is dropped
struct RequestGuard {
    inner: Arc<GovernorInner>,
    key: AnalysisRequestKey,
    request_id: String,
    finished: bool,
}

impl RequestGuard {
    /// Record the outcome and release the request's entries
    fn finish(mut self, outcome: Result<MediaAnalysisResult>) -> Result<MediaAnalysisResult> {
        self.finished = true;
        let key = self.key.clone();
        let request_id = self.request_id.clone();

        self.inner.update_state(move |state| {
            let retirement = state.retired.remove(&request_id);
            let outcome = match state.owns(&key, &request_id) {
                Some(false) => {
                    log::debug!("Analysis {} superseded by a newer request for the same key", request_id);
                    Err(AnalysisError::superseded(format!("request {} was replaced", request_id)))
                }
                ownership => {
                    if ownership == Some(true) {
                        state.remove_request(&key);
                    }
                    match retirement {
                        Some(Retirement::Discarded) => {
                            Err(AnalysisError::superseded(format!("request {} was discarded by a reset", request_id)))
                        }
                        Some(Retirement::Evicted) => {
                            let error = AnalysisError::timeout("request was stuck and evicted by the watchdog");
                            state.circuit_breaker.record_failure(Instant::now());
                            state.failed_requests.insert(key.clone());
                            Err(error)
                        }
                        None => {
                            match &outcome {
                                Ok(_) => state.circuit_breaker.record_success(),
                                Err(error) if error.is_execution_failure() => {
                                    state.circuit_breaker.record_failure(Instant::now());
                                    state.failed_requests.insert(key.clone());
                                }
                                Err(error) => {
                                    log::debug!("Analysis {} rejected without a remote failure: {}", request_id, error);
                                }
                            }
                            outcome
                        }
                    }
                }
            };
            state.sync_analyzing();
            outcome
        })
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::debug!("Analysis {} dropped before completion", self.request_id);
        let key = &self.key;
        let request_id = &self.request_id;
        self.inner.update_state(|state| {
            state.retired.remove(request_id);
            if state.owns(key, request_id) == Some(true) {
                if let Some(token) = state.abort_handles.get(key) {
                    token.cancel();
                }
                state.remove_request(key);
            }
            state.sync_analyzing();
        });
    }
}

/// Admission-controlled front door to the remote analysis function
#[derive(Clone)]
pub struct MediaAnalysisGovernor {
    inner: Arc<GovernorInner>,
}

impl MediaAnalysisGovernor {
    /// Create a governor; prefer [`crate::core::GovernorBuilder`] when config comes from a provider
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        notifier: Arc<dyn Notifier>,
        config: GovernorConfig,
    ) -> Self {
        let state = Mutex::new(AnalysisQueueState::new(&config));
        Self {
            inner: Arc::new(GovernorInner {
                backend,
                notifier,
                config,
                state,
            }),
        }
    }

    pub fn builder() -> crate::core::GovernorBuilder {
        crate::core::GovernorBuilder::new()
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.inner.config
    }

    /// Analyze one media item; `None` means the failure was already reported
    pub async fn analyze(&self, options: AnalysisOptions) -> Option<MediaAnalysisResult> {
        self.analyze_with_outcome(options).await.ok()
    }

    /// Same as [`Self::analyze`] with `force_retry` set
    pub async fn retry_analysis(&self, options: AnalysisOptions) -> Option<MediaAnalysisResult> {
        self.analyze(options.forced()).await
    }

    /// Analyze and return the typed error; notifications are emitted exactly as in `analyze`
    #[tracing::instrument(
        level = "debug",
        skip(self, options),
        fields(media_url = %options.media_url, force_retry = options.force_retry)
    )]
    pub async fn analyze_with_outcome(&self, options: AnalysisOptions) -> Result<MediaAnalysisResult> {
        let outcome = self.execute(options).await;
        match &outcome {
            Ok(result) => {
                let description = if result.has_non_conformity {
                    "Non-conformity detected in the media."
                } else {
                    "No non-conformity detected."
                };
                self.inner
                    .notifier
                    .notify(Notification::success("Analysis complete", description));
            }
            Err(error) if error.is_silent() => {
                log::debug!("Suppressed analysis request: {}", error);
            }
            Err(error) => {
                self.inner.notifier.notify(Notification::for_analysis_error(error));
            }
        }
        outcome
    }

    /// Whether a failed request for these inputs can be retried
    pub fn can_retry(&self, media_url: &str, question_text: &str, user_answer: Option<&str>) -> bool {
        let key = AnalysisRequestKey::new(media_url, question_text, user_answer);
        self.inner.update_state(|state| state.failed_requests.contains(&key))
    }

    /// Abort every in-flight request; the breaker and failure cache are kept
    pub fn cancel_all_analysis(&self) {
        let cancelled = self.inner.update_state(|state| {
            let count = state.abort_handles.len();
            state.clear_in_flight(None);
            count
        });
        log::info!("Cancelled {} in-flight analysis request(s)", cancelled);
    }

    /// Abort everything and forget all history, closing the circuit
    pub fn reset_all_state(&self) {
        self.inner.update_state(|state| {
            state.clear_in_flight(Some(Retirement::Discarded));
            state.circuit_breaker.reset();
            state.failed_requests.clear();
        });
        log::info!("Media analysis state reset");
    }

    pub fn is_analyzing(&self) -> bool {
        self.inner.update_state(|state| state.analyzing)
    }

    /// Circuit state as seen by a request arriving now
    pub fn circuit_state(&self) -> CircuitBreakerStatus {
        let now = Instant::now();
        self.inner.update_state(|state| state.circuit_breaker.evaluate(now))
    }

    /// Time of the last watchdog pass
    pub fn last_heartbeat(&self) -> Instant {
        self.inner.update_state(|state| state.last_heartbeat)
    }

    pub fn snapshot(&self) -> AnalysisQueueSnapshot {
        self.inner.update_state(|state| {
            let mut queued: Vec<String> = state.request_queue.iter().map(|k| k.to_string()).collect();
            let mut failed: Vec<String> = state.failed_requests.iter().map(|k| k.to_string()).collect();
            queued.sort();
            failed.sort();
            AnalysisQueueSnapshot {
                analyzing: state.analyzing,
                queued,
                failed,
                active_requests: state.active_requests.len(),
                abort_handles: state.abort_handles.len(),
                circuit_state: state.circuit_breaker.status(),
                circuit_failures: state.circuit_breaker.failure_count(),
            }
        })
    }

    async fn execute(&self, options: AnalysisOptions) -> Result<MediaAnalysisResult> {
        if options.media_url.trim().is_empty() {
            return Err(AnalysisError::invalid_input("media URL is empty"));
        }

        let key = options.key();
        let admission = self.admit(&key, options.force_retry)?;
        if let Some(watchdog) = admission.watchdog.clone() {
            self.spawn_watchdog(watchdog);
        }

        let guard = RequestGuard {
            inner: Arc::clone(&self.inner),
            key,
            request_id: admission.request_id.clone(),
            finished: false,
        };

        let media_type = MediaType::from_url(&options.media_url);
        let request = AnalysisRequest {
            media_url: options.media_url.clone(),
            question_text: options.question_text.clone(),
            user_answer: options.user_answer.clone(),
            media_type,
            timestamp: chrono::Utc::now().timestamp_millis(),
            request_id: admission.request_id.clone(),
        };

        log::debug!(
            "Dispatching analysis {} ({}) for {}",
            request.request_id,
            media_type,
            request.media_url
        );

        let timeout = self.inner.config.request_timeout;
        let response = tokio::select! {
            response = self.inner.backend.analyze_media(&request, admission.token.clone()) => response,
            _ = tokio::time::sleep(timeout) => {
                Err(AnalysisError::timeout(format!("no answer within {}s", timeout.as_secs())))
            }
            _ = admission.token.cancelled() => {
                Err(AnalysisError::cancelled("analysis request was cancelled"))
            }
        };

        let outcome = response.map_err(classify_remote_error).and_then(|response| {
            if response.comment_text().is_none() {
                return Err(AnalysisError::remote("analysis function returned an empty analysis"));
            }
            Ok(MediaAnalysisResult::from_response(
                &response,
                media_type,
                &options.question_text,
                options.user_answer.as_deref(),
            ))
        });

        match &outcome {
            Ok(result) => log::info!(
                "Analysis {} completed (non-conformity: {})",
                admission.request_id,
                result.has_non_conformity
            ),
            Err(error) => log::warn!("Analysis {} failed: {}", admission.request_id, error),
        }

        guard.finish(outcome)
    }

    /// Run the early-exit checks and register the request
    fn admit(&self, key: &AnalysisRequestKey, force_retry: bool) -> Result<Admission> {
        let now = Instant::now();
        let max_concurrent = self.inner.config.max_concurrent;

        self.inner.update_state(|state| {
            if !state.circuit_breaker.allows_request(now, force_retry) {
                let remaining = state.circuit_breaker.remaining_cooldown(now).unwrap_or_default();
                return Err(AnalysisError::unavailable(format!(
                    "circuit open after {} consecutive failures, next probe in {}s",
                    state.circuit_breaker.failure_count(),
                    remaining.as_secs()
                )));
            }

            if state.request_queue.len() >= max_concurrent {
                return Err(AnalysisError::overloaded(format!(
                    "{} analyses already running",
                    state.request_queue.len()
                )));
            }

            if force_retry {
                state.failed_requests.remove(key);
            } else if state.request_queue.contains(key) || state.failed_requests.contains(key) {
                return Err(AnalysisError::duplicate(key.to_string()));
            }

            if let Some(previous) = state.abort_handles.remove(key) {
                previous.cancel();
            }

            let token = CancellationToken::new();
            let request_id = generate_request_id();
            state.abort_handles.insert(key.clone(), token.clone());
            state.request_queue.insert(key.clone());
            state.active_requests.insert(
                key.clone(),
                ActiveRequestRecord {
                    start_time: now,
                    attempt: 1,
                    request_id: request_id.clone(),
                },
            );
            state.analyzing = true;

            let watchdog = if state.watchdog.is_none() {
                let watchdog = CancellationToken::new();
                state.watchdog = Some(watchdog.clone());
                Some(watchdog)
            } else {
                None
            };

            Ok(Admission {
                token,
                request_id,
                watchdog,
            })
        })
    }

    fn spawn_watchdog(&self, stop: CancellationToken) {
        let inner: Weak<GovernorInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.watchdog_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(inner) = inner.upgrade() else { break };
                if !inner.watchdog_tick(Instant::now()) {
                    break;
                }
            }
            log::debug!("Analysis watchdog stopped");
        });
    }
}

/// Promote throttling reported only in the message to a rate-limit error
fn classify_remote_error(error: AnalysisError) -> AnalysisError {
    if error.kind() == ErrorKind::Remote && mapping::mentions_rate_limit(error.message()) {
        let message = error.message().to_string();
        return AnalysisError::rate_limit(message);
    }
    error
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::tests::support::{build_governor, options, photo, wait_until, FakeBackend, QUESTION};

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_evicts_stuck_request() {
        let backend = Arc::new(FakeBackend::new(Duration::from_secs(600)));
        let (governor, notifier) = build_governor(backend);

        let handle = {
            let governor = governor.clone();
            tokio::spawn(async move { governor.analyze_with_outcome(options(1)).await })
        };
        wait_until(|| governor.is_analyzing()).await;

        let later = Instant::now() + governor.config().stuck_after() + Duration::from_secs(1);
        assert!(!governor.inner.watchdog_tick(later));
        assert!(!governor.is_analyzing());
        assert_eq!(governor.last_heartbeat(), later);

        let error = handle.await.unwrap().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(governor.can_retry(&photo(1), QUESTION, None));
        assert_eq!(governor.snapshot().circuit_failures, 1);
        assert_eq!(notifier.count("Analysis timed out"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_keeps_young_requests() {
        let backend = Arc::new(FakeBackend::new(Duration::from_secs(20)));
        let (governor, _) = build_governor(backend);

        let handle = {
            let governor = governor.clone();
            tokio::spawn(async move { governor.analyze(options(1)).await })
        };
        wait_until(|| governor.is_analyzing()).await;

        assert!(governor.inner.watchdog_tick(Instant::now() + Duration::from_secs(10)));
        assert_eq!(governor.snapshot().active_requests, 1);
        assert!(handle.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_watchdog_repairs_orphaned_queue_entry() {
        let backend = Arc::new(FakeBackend::new(Duration::ZERO));
        let (governor, _) = build_governor(backend);

        let key = options(1).key();
        governor.inner.update_state(|state| {
            state.request_queue.insert(key);
            state.analyzing = true;
        });

        assert!(!governor.inner.watchdog_tick(Instant::now()));
        assert!(!governor.is_analyzing());
        assert!(governor.snapshot().queued.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_runs_only_while_analyzing() {
        let backend = Arc::new(FakeBackend::new(Duration::from_secs(20)));
        let (governor, _) = build_governor(backend);
        let started = Instant::now();

        let handle = {
            let governor = governor.clone();
            tokio::spawn(async move { governor.analyze(options(1)).await })
        };
        wait_until(|| governor.is_analyzing()).await;
        assert!(governor.inner.update_state(|state| state.watchdog.is_some()));

        assert!(handle.await.unwrap().is_some());
        assert!(governor.inner.update_state(|state| state.watchdog.is_none()));
        assert!(governor.last_heartbeat() >= started + Duration::from_secs(15));
    }
}
