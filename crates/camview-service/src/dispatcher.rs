//! Deduplicated new-upload notifications.
//!
//! One pass scans today's and yesterday's day partitions, announces every
//! media object the ledger has not seen, records each successful send and
//! finally prunes expired ledger rows. Work is strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use camview_core::{CoreError, NotificationLedger};
use camview_storage::{ObjectMetadata, ObjectStore};
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::partition_index::PartitionIndex;
use crate::sink::{NotificationMessage, NotificationSink};

/// Tunables for a notification pass.
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Bucket name shown in messages.
    pub bucket: String,
    /// Ledger rows older than this are pruned after each pass.
    pub retention: chrono::Duration,
    /// Pause after each successful send.
    pub send_delay: Duration,
}

impl DispatcherOptions {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            retention: chrono::Duration::days(7),
            send_delay: Duration::from_secs(2),
        }
    }
}

/// Outcome counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Media objects seen in the scan window.
    pub scanned: u64,
    /// Objects already in the ledger.
    pub skipped: u64,
    /// Objects announced during this pass.
    pub notified: u64,
    /// Objects left for the next pass (send or ledger lookup failed).
    pub failed: u64,
    /// Ledger rows removed by pruning.
    pub pruned: u64,
}

/// Scans recent partitions and notifies the sink about unseen objects.
pub struct NotificationDispatcher {
    index: PartitionIndex,
    ledger: Arc<dyn NotificationLedger>,
    sink: Arc<dyn NotificationSink>,
    options: DispatcherOptions,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        ledger: Arc<dyn NotificationLedger>,
        sink: Arc<dyn NotificationSink>,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            index: PartitionIndex::new(store),
            ledger,
            sink,
            options,
        }
    }

    /// Runs one pass anchored on the local calendar date.
    pub async fn run_pass(&self) -> PassReport {
        self.run_pass_on(Local::now().date_naive()).await
    }

    /// Runs one pass over `today` and the day before it.
    ///
    /// Never fails as a whole: store, sink and ledger errors are logged and
    /// counted, and the affected objects are retried by the next pass.
    pub async fn run_pass_on(&self, today: NaiveDate) -> PassReport {
        let mut report = PassReport::default();

        let mut window = vec![today];
        if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
            window.push(yesterday);
        }

        for date in window {
            let objects = match self.index.list_objects_on(date).await {
                Ok(objects) => objects,
                Err(e) => {
                    tracing::warn!(date = %date, error = %e, "Failed to list partition, skipping");
                    continue;
                }
            };

            for object in &objects {
                report.scanned += 1;
                self.process(object, &mut report).await;
            }
        }

        match self.ledger.prune_older_than(self.options.retention).await {
            Ok(pruned) => report.pruned = pruned,
            Err(e) => tracing::error!(error = %e, "Failed to prune notification ledger"),
        }

        if report.notified == 0 {
            tracing::info!(
                scanned = report.scanned,
                failed = report.failed,
                "No new videos found"
            );
        } else {
            tracing::info!(
                notified = report.notified,
                scanned = report.scanned,
                failed = report.failed,
                "Posted notifications for new videos"
            );
        }

        report
    }

    async fn process(&self, object: &ObjectMetadata, report: &mut PassReport) {
        let key = object.key.as_str();

        match self.ledger.is_notified(key).await {
            Ok(true) => {
                report.skipped += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Ledger lookup failed, skipping this pass");
                report.failed += 1;
                return;
            }
        }

        let message = NotificationMessage::new_upload(&self.options.bucket, object);
        if let Err(e) = self.sink.send(&message).await {
            tracing::warn!(key = %key, error = %e, "Failed to send notification");
            report.failed += 1;
            return;
        }

        match self.ledger.record_notified(key).await {
            Ok(()) | Err(CoreError::DuplicateKey(_)) => {}
            Err(e) => {
                // Sent but unrecorded; the next pass will announce it again
                tracing::error!(key = %key, error = %e, "Failed to record notification");
            }
        }

        report.notified += 1;
        tracing::info!(key = %key, "Posted notification");

        if !self.options.send_delay.is_zero() {
            tokio::time::sleep(self.options.send_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use camview_core::CoreResult;
    use camview_metadata::SqliteNotificationLedger;
    use camview_storage::MockObjectStore;
    use parking_lot::Mutex;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Records messages; pops one scripted outcome per send, succeeding when empty.
    #[derive(Default)]
    struct ScriptedSink {
        outcomes: Mutex<VecDeque<bool>>,
        sent: Mutex<Vec<NotificationMessage>>,
        attempts: Mutex<u64>,
    }

    impl ScriptedSink {
        fn failing_first(n: usize) -> Self {
            let sink = Self::default();
            sink.outcomes.lock().extend(std::iter::repeat(false).take(n));
            sink
        }

        fn sent_keys(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .map(|m| m.fields[3].value.trim_matches('`').to_string())
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for ScriptedSink {
        async fn send(&self, message: &NotificationMessage) -> CoreResult<()> {
            *self.attempts.lock() += 1;
            if self.outcomes.lock().pop_front() == Some(false) {
                return Err(CoreError::SendFailed("scripted failure".to_string()));
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }

    async fn ledger() -> Arc<SqliteNotificationLedger> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        camview_metadata::run_migrations(&pool).await.unwrap();
        Arc::new(SqliteNotificationLedger::new(pool))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn options() -> DispatcherOptions {
        DispatcherOptions {
            send_delay: Duration::ZERO,
            ..DispatcherOptions::new("camera-footage")
        }
    }

    fn seeded_store() -> MockObjectStore {
        let mock = MockObjectStore::new();
        mock.insert_sized("2024/03/01/cam_0800.mp4", 100);
        mock.insert_sized("2024/03/01/cam_0800.jpg", 5);
        // Leap day is yesterday
        mock.insert_sized("2024/02/29/cam_2300.mp4", 200);
        // Outside the scan window
        mock.insert_sized("2024/02/28/cam_1200.mp4", 300);
        mock
    }

    #[tokio::test]
    async fn test_second_pass_sends_nothing() {
        let store = seeded_store();
        let ledger = ledger().await;
        let sink = Arc::new(ScriptedSink::default());
        let dispatcher =
            NotificationDispatcher::new(Arc::new(store), ledger.clone(), sink.clone(), options());

        let first = dispatcher.run_pass_on(today()).await;
        assert_eq!(first.scanned, 2);
        assert_eq!(first.notified, 2);
        assert_eq!(
            sink.sent_keys(),
            vec!["2024/03/01/cam_0800.mp4", "2024/02/29/cam_2300.mp4"]
        );

        let second = dispatcher.run_pass_on(today()).await;
        assert_eq!(second.scanned, 2);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.notified, 0);
        assert_eq!(sink.sent.lock().len(), 2);
        assert_eq!(ledger.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_send_retried_next_pass() {
        let store = MockObjectStore::new();
        store.insert_sized("2024/03/01/cam_0800.mp4", 100);
        let ledger = ledger().await;
        let sink = Arc::new(ScriptedSink::failing_first(1));
        let dispatcher =
            NotificationDispatcher::new(Arc::new(store), ledger.clone(), sink.clone(), options());

        let first = dispatcher.run_pass_on(today()).await;
        assert_eq!(first.failed, 1);
        assert_eq!(first.notified, 0);
        assert!(!ledger.is_notified("2024/03/01/cam_0800.mp4").await.unwrap());

        let second = dispatcher.run_pass_on(today()).await;
        assert_eq!(second.notified, 1);

        assert_eq!(sink.sent.lock().len(), 1);
        assert_eq!(*sink.attempts.lock(), 2);
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_siblings() {
        let ledger = ledger().await;
        let sink = Arc::new(ScriptedSink::failing_first(1));
        let dispatcher =
            NotificationDispatcher::new(Arc::new(seeded_store()), ledger.clone(), sink.clone(), options());

        let report = dispatcher.run_pass_on(today()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(sink.sent_keys(), vec!["2024/02/29/cam_2300.mp4"]);
    }

    #[tokio::test]
    async fn test_failing_partition_skipped() {
        let store = seeded_store();
        store.fail_prefix("2024/03/01/");
        let sink = Arc::new(ScriptedSink::default());
        let dispatcher =
            NotificationDispatcher::new(Arc::new(store), ledger().await, sink.clone(), options());

        let report = dispatcher.run_pass_on(today()).await;
        assert_eq!(report.scanned, 1);
        assert_eq!(sink.sent_keys(), vec!["2024/02/29/cam_2300.mp4"]);
    }

    #[tokio::test]
    async fn test_pass_prunes_expired_rows() {
        let ledger = ledger().await;
        ledger
            .record_notified_at(
                "2024/01/01/old.mp4",
                chrono::Utc::now() - chrono::Duration::days(8),
            )
            .await
            .unwrap();

        let dispatcher = NotificationDispatcher::new(
            Arc::new(MockObjectStore::new()),
            ledger.clone(),
            Arc::new(ScriptedSink::default()),
            options(),
        );

        let report = dispatcher.run_pass_on(today()).await;
        assert_eq!(report.pruned, 1);
        assert_eq!(report.scanned, 0);
        assert_eq!(ledger.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_already_recorded_key_counts_as_notified() {
        struct RacingLedger;

        #[async_trait]
        impl NotificationLedger for RacingLedger {
            async fn is_notified(&self, _key: &str) -> CoreResult<bool> {
                Ok(false)
            }
            async fn record_notified(&self, key: &str) -> CoreResult<()> {
                Err(CoreError::DuplicateKey(key.to_string()))
            }
            async fn prune_older_than(&self, _retention: chrono::Duration) -> CoreResult<u64> {
                Err(CoreError::ledger_unavailable("disk full"))
            }
        }

        let store = MockObjectStore::new();
        store.insert_sized("2024/03/01/a.mp4", 1);
        let dispatcher = NotificationDispatcher::new(
            Arc::new(store),
            Arc::new(RacingLedger),
            Arc::new(ScriptedSink::default()),
            options(),
        );

        let report = dispatcher.run_pass_on(today()).await;
        assert_eq!(report.notified, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.pruned, 0);
    }

    #[tokio::test]
    async fn test_delay_only_after_success() {
        let sink = Arc::new(ScriptedSink::failing_first(2));
        let dispatcher = NotificationDispatcher::new(
            Arc::new(seeded_store()),
            ledger().await,
            sink,
            DispatcherOptions {
                send_delay: Duration::from_millis(500),
                ..DispatcherOptions::new("camera-footage")
            },
        );

        let started = Instant::now();
        let report = dispatcher.run_pass_on(today()).await;
        assert_eq!(report.failed, 2);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_delay_after_each_success() {
        let sink = Arc::new(ScriptedSink::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::new(seeded_store()),
            ledger().await,
            sink.clone(),
            DispatcherOptions {
                send_delay: Duration::from_millis(200),
                ..DispatcherOptions::new("camera-footage")
            },
        );

        let started = Instant::now();
        let report = dispatcher.run_pass_on(today()).await;
        assert_eq!(report.notified, 2);
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(sink.sent.lock().len(), 2);
    }
}
