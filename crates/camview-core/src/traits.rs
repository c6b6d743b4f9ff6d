use async_trait::async_trait;
use chrono::Duration;

use crate::error::CoreResult;

/// Persistent de-duplication store for outbound notifications.
///
/// A single pipeline instance owns the ledger at a time; implementations only
/// need each individual write to be atomic.
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Returns true when `key` has already been announced.
    async fn is_notified(&self, key: &str) -> CoreResult<bool>;

    /// Records `key` as announced now.
    ///
    /// Fails with `CoreError::DuplicateKey` when a record already exists.
    async fn record_notified(&self, key: &str) -> CoreResult<()>;

    /// Deletes records posted before `now - retention`, returning how many were removed.
    async fn prune_older_than(&self, retention: Duration) -> CoreResult<u64>;
}
