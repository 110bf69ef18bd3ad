//! Debounced draft persistence
//!
//! [`AutoSaver`] coalesces bursts of edits into a single save issued once the
//! input has been quiet for the configured debounce period.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::AutoSaveConfig;
use crate::error::Result;
use crate::notify::{Notification, Notifier};

/// Destination of auto-saved drafts
#[async_trait]
pub trait DraftStore<T>: Send + Sync {
    async fn save(&self, value: &T) -> Result<()>;
}

/// Lifecycle of the most recent draft
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AutoSaveStatus {
    Idle,
    Pending,
    Saving,
    Saved { at: DateTime<Utc> },
    Failed { message: String },
}

struct PendingDraft<T> {
    value: Option<T>,
    timer: Option<CancellationToken>,
}

struct AutoSaveInner<T> {
    store: Arc<dyn DraftStore<T>>,
    notifier: Arc<dyn Notifier>,
    config: AutoSaveConfig,
    pending: Mutex<PendingDraft<T>>,
    save_lock: tokio::sync::Mutex<()>,
    status: watch::Sender<AutoSaveStatus>,
}

impl<T: Send + Sync + 'static> AutoSaveInner<T> {
    fn with_pending<R>(&self, f: impl FnOnce(&mut PendingDraft<T>) -> R) -> R {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut pending)
    }

    /// Save the pending draft, if any
    ///
    /// `trigger` is the debounce timer that fired; a timer that was replaced
    /// or cancelled in the meantime saves nothing.
    async fn save_pending(&self, trigger: Option<&CancellationToken>) -> Result<bool> {
        let _saving = self.save_lock.lock().await;

        let value = self.with_pending(|pending| {
            if trigger.map_or(false, CancellationToken::is_cancelled) {
                return None;
            }
            if let Some(timer) = pending.timer.take() {
                timer.cancel();
            }
            pending.value.take()
        });
        let Some(value) = value else {
            return Ok(false);
        };

        self.status.send_replace(AutoSaveStatus::Saving);
        match self.store.save(&value).await {
            Ok(()) => {
                log::debug!("Draft auto-saved");
                let pending_again = self.with_pending(|pending| pending.value.is_some());
                if !pending_again {
                    self.status.send_replace(AutoSaveStatus::Saved { at: Utc::now() });
                }
                Ok(true)
            }
            Err(error) => {
                log::warn!("Auto-save failed: {}", error);
                self.with_pending(|pending| {
                    if pending.value.is_none() {
                        pending.value = Some(value);
                    }
                });
                self.status.send_replace(AutoSaveStatus::Failed {
                    message: error.to_string(),
                });
                self.notifier.notify(Notification::error(
                    "Auto-save failed",
                    format!("Your changes were kept locally: {}", error.message()),
                ));
                Err(error)
            }
        }
    }
}

/// Debounced saver for drafts of type `T`
pub struct AutoSaver<T> {
    inner: Arc<AutoSaveInner<T>>,
}

impl<T> Clone for AutoSaver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> AutoSaver<T> {
    pub fn new(store: Arc<dyn DraftStore<T>>, notifier: Arc<dyn Notifier>, config: AutoSaveConfig) -> Self {
        let (status, _) = watch::channel(AutoSaveStatus::Idle);
        Self {
            inner: Arc::new(AutoSaveInner {
                store,
                notifier,
                config,
                pending: Mutex::new(PendingDraft {
                    value: None,
                    timer: None,
                }),
                save_lock: tokio::sync::Mutex::new(()),
                status,
            }),
        }
    }

    /// Replace the pending draft and restart the debounce timer
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since the timer is a
    /// spawned task.
    pub fn schedule(&self, value: T) {
        let timer = CancellationToken::new();
        self.inner.with_pending(|pending| {
            if let Some(previous) = pending.timer.replace(timer.clone()) {
                previous.cancel();
            }
            pending.value = Some(value);
        });
        self.inner.status.send_replace(AutoSaveStatus::Pending);

        let inner = Arc::clone(&self.inner);
        let debounce = self.inner.config.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(debounce) => {
                    // failures are already reported through the notifier
                    let _ = inner.save_pending(Some(&timer)).await;
                }
            }
        });
    }

    /// Save the pending draft now; returns whether anything was saved
    pub async fn flush(&self) -> Result<bool> {
        self.inner.save_pending(None).await
    }

    /// Drop the pending draft without saving it
    pub fn cancel(&self) {
        let dropped = self.inner.with_pending(|pending| {
            if let Some(timer) = pending.timer.take() {
                timer.cancel();
            }
            pending.value.take().is_some()
        });
        if dropped {
            self.inner.status.send_if_modified(|status| {
                if matches!(status, AutoSaveStatus::Pending | AutoSaveStatus::Failed { .. }) {
                    *status = AutoSaveStatus::Idle;
                    true
                } else {
                    false
                }
            });
        }
    }

    pub fn has_pending(&self) -> bool {
        self.inner.with_pending(|pending| pending.value.is_some())
    }

    pub fn status(&self) -> AutoSaveStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutoSaveStatus> {
        self.inner.status.subscribe()
    }
}
