//! User-facing notifications
//!
//! The governor reports every terminal failure exactly once through a
//! [`Notifier`]; callers receive `None` and must not notify again.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{AnalysisError, ErrorKind};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Toast-style message for the person running the inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, description)
    }

    /// Message shown for a failed analysis, distinguishing "try later" from
    /// "retry this media now"
    pub fn for_analysis_error(error: &AnalysisError) -> Self {
        match error.kind() {
            ErrorKind::InvalidInput => Self::error(
                "Invalid media",
                "A media URL is required to run the analysis.",
            ),
            ErrorKind::Unavailable => Self::warning(
                "Analysis temporarily unavailable",
                "Too many recent failures. Please wait a minute before trying again.",
            ),
            ErrorKind::Overloaded => Self::warning(
                "Analysis queue full",
                "Wait for the running analyses to finish before starting another.",
            ),
            ErrorKind::Timeout => Self::error(
                "Analysis timed out",
                "The analysis took too long. You can retry this media.",
            ),
            ErrorKind::RateLimit => Self::warning(
                "Too many requests",
                "The analysis service is busy. Please wait a few seconds and retry.",
            ),
            ErrorKind::Cancelled => Self::new(
                NotificationKind::Info,
                "Analysis cancelled",
                "The analysis was cancelled before it finished.",
            ),
            _ => Self::error(
                "Analysis failed",
                format!("Could not analyze this media: {}", error.message()),
            ),
        }
    }
}

/// Sink for user-facing notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => log::error!("{}: {}", notification.title, notification.description),
            NotificationKind::Warning => log::warn!("{}: {}", notification.title, notification.description),
            NotificationKind::Info | NotificationKind::Success => {
                log::info!("{}: {}", notification.title, notification.description)
            }
        }
    }
}

/// Forwards notifications to a UI task over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end the UI drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            log::debug!("Notification receiver dropped, discarding notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_differentiated_by_cause() {
        let timeout = Notification::for_analysis_error(&AnalysisError::timeout("35s"));
        let rate = Notification::for_analysis_error(&AnalysisError::rate_limit("429"));
        let cancelled = Notification::for_analysis_error(&AnalysisError::cancelled("user"));
        let generic = Notification::for_analysis_error(&AnalysisError::remote("boom"));

        let titles = [&timeout.title, &rate.title, &cancelled.title, &generic.title];
        for (i, a) in titles.iter().enumerate() {
            for b in titles.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(generic.description.contains("boom"));
    }

    #[tokio::test]
    async fn test_channel_notifier_delivers() {
        let (notifier, mut receiver) = ChannelNotifier::new();
        notifier.notify(Notification::success("Analysis complete", "done"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.kind, NotificationKind::Success);
    }
}
