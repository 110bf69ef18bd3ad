//! Test doubles shared by the unit tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisOptions, MediaAnalysisGovernor};
use crate::config::GovernorConfig;
use crate::core::{AnalysisBackend, AnalysisRequest, AnalysisResponse};
use crate::error::{AnalysisError, Result};
use crate::notify::{Notification, Notifier};

pub const QUESTION: &str = "O extintor está sinalizado?";

pub fn photo(n: usize) -> String {
    format!("https://storage.example.com/inspections/photo-{}.jpg", n)
}

pub fn options(n: usize) -> AnalysisOptions {
    AnalysisOptions::new(photo(n), QUESTION)
}

/// Scripted analysis backend that takes `delay` of virtual time per call
pub struct FakeBackend {
    delay: Duration,
    comment: String,
    failing: AtomicBool,
    failures: Mutex<VecDeque<AnalysisError>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    starts: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl FakeBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            comment: "Extintor sinalizado e dentro da validade".to_string(),
            failing: AtomicBool::new(false),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            starts: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Every call fails with a generic remote error while set
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next call with `error`
    pub fn fail_next(&self, error: AnalysisError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalysisBackend for FakeBackend {
    async fn analyze_media(
        &self,
        request: &AnalysisRequest,
        _cancel: CancellationToken,
    ) -> Result<AnalysisResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.starts.lock().unwrap().push(Instant::now());
        self.requests.lock().unwrap().push(request.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        tokio::time::sleep(self.delay).await;

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AnalysisError::remote("analysis function crashed"));
        }
        AnalysisResponse::from_value(json!({ "comment": self.comment }))
    }
}

/// Notifier that keeps everything it is given
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }

    pub fn count(&self, title: &str) -> usize {
        self.titles().iter().filter(|t| t.as_str() == title).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

pub fn governor_with(
    backend: Arc<dyn AnalysisBackend>,
    config: GovernorConfig,
) -> (MediaAnalysisGovernor, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let governor = MediaAnalysisGovernor::new(backend, notifier.clone(), config);
    (governor, notifier)
}

pub fn build_governor(backend: Arc<FakeBackend>) -> (MediaAnalysisGovernor, Arc<RecordingNotifier>) {
    governor_with(backend, GovernorConfig::default())
}

/// Yield until `condition` holds; time does not advance while spinning
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
