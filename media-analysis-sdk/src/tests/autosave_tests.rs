//! Tests for the debounced auto-saver

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::autosave::{AutoSaveStatus, AutoSaver, DraftStore};
    use crate::config::AutoSaveConfig;
    use crate::error::{AnalysisError, Result};
    use crate::tests::support::RecordingNotifier;

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<String>>,
        failing: AtomicBool,
    }

    impl MemoryStore {
        fn saved(&self) -> Vec<String> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DraftStore<String> for MemoryStore {
        async fn save(&self, value: &String) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(AnalysisError::network("offline"));
            }
            self.saved.lock().unwrap().push(value.clone());
            Ok(())
        }
    }

    fn saver() -> (AutoSaver<String>, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let saver = AutoSaver::new(store.clone(), notifier.clone(), AutoSaveConfig::default());
        (saver, store, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_bursts_are_coalesced_into_one_save() {
        let (saver, store, _) = saver();

        saver.schedule("draft 1".to_string());
        tokio::time::sleep(Duration::from_secs(1)).await;
        saver.schedule("draft 2".to_string());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(store.saved().is_empty());
        assert_eq!(saver.status(), AutoSaveStatus::Pending);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.saved(), vec!["draft 2".to_string()]);
        assert!(matches!(saver.status(), AutoSaveStatus::Saved { .. }));
        assert!(!saver.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_saves_immediately() {
        let (saver, store, _) = saver();

        saver.schedule("checklist".to_string());
        assert!(saver.flush().await.unwrap());
        assert_eq!(store.saved(), vec!["checklist".to_string()]);

        // the debounce timer was cancelled by the flush
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.saved().len(), 1);
        assert!(!saver.flush().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_value_for_retry() {
        let (saver, store, notifier) = saver();
        store.failing.store(true, Ordering::SeqCst);

        saver.schedule("answers".to_string());
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(matches!(saver.status(), AutoSaveStatus::Failed { .. }));
        assert_eq!(notifier.titles(), vec!["Auto-save failed".to_string()]);
        assert!(saver.has_pending());

        store.failing.store(false, Ordering::SeqCst);
        assert!(saver.flush().await.unwrap());
        assert_eq!(store.saved(), vec!["answers".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_draft() {
        let (saver, store, _) = saver();

        saver.schedule("discard me".to_string());
        saver.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(store.saved().is_empty());
        assert_eq!(saver.status(), AutoSaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_updates_are_published() {
        let (saver, _, _) = saver();
        let mut status = saver.subscribe();

        saver.schedule("v1".to_string());
        status.changed().await.unwrap();
        assert_eq!(*status.borrow(), AutoSaveStatus::Pending);

        saver.flush().await.unwrap();
        assert!(matches!(*status.borrow_and_update(), AutoSaveStatus::Saved { .. }));
    }

    #[test]
    #[should_panic]
    fn test_schedule_requires_a_runtime() {
        let (saver, _, _) = saver();
        saver.schedule("no runtime".to_string());
    }
}
