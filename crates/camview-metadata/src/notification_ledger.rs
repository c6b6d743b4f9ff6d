//! SQLite implementation of the notification ledger.

use async_trait::async_trait;
use camview_core::{CoreError, CoreResult, NotificationLedger, NotificationRecord};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::{query, Row, SqlitePool};

use crate::util::{connect_options, create_sqlite_pool, run_migrations};

/// Ledger of announced keys backed by the `posted_videos` table.
#[derive(Clone)]
pub struct SqliteNotificationLedger {
    pool: SqlitePool,
}

impl SqliteNotificationLedger {
    /// Wraps an existing pool. Migrations must already have been applied.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (or creates) the ledger database at `path_or_url` and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::LedgerUnavailable` if the database cannot be opened or migrated.
    pub async fn open(path_or_url: &str) -> CoreResult<Self> {
        let options = connect_options(path_or_url)
            .map_err(|e| CoreError::ledger_unavailable(format!("open {path_or_url}: {e}")))?;
        let pool = create_sqlite_pool(options)
            .await
            .map_err(|e| CoreError::ledger_unavailable(format!("open {path_or_url}: {e}")))?;
        run_migrations(&pool)
            .await
            .map_err(|e| CoreError::ledger_unavailable(format!("migrate {path_or_url}: {e}")))?;

        tracing::debug!(path = %path_or_url, "Notification ledger ready");
        Ok(Self::new(pool))
    }

    /// Records `key` with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DuplicateKey` if the key is already recorded.
    pub async fn record_notified_at(&self, key: &str, posted_at: DateTime<Utc>) -> CoreResult<()> {
        query("INSERT INTO posted_videos (s3_key, posted_at) VALUES (?1, ?2)")
            .bind(key)
            .bind(format_timestamp(posted_at))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::DuplicateKey(key.to_string())
                } else {
                    CoreError::ledger_unavailable(e.to_string())
                }
            })?;

        Ok(())
    }

    /// Fetches the record for `key`, if any.
    pub async fn get(&self, key: &str) -> CoreResult<Option<NotificationRecord>> {
        let row = query("SELECT s3_key, posted_at FROM posted_videos WHERE s3_key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::ledger_unavailable(e.to_string()))?;

        row.map(|row| -> CoreResult<NotificationRecord> {
            let key: String = row
                .try_get("s3_key")
                .map_err(|e| CoreError::internal(e.to_string()))?;
            let posted_at: String = row
                .try_get("posted_at")
                .map_err(|e| CoreError::internal(e.to_string()))?;

            Ok(NotificationRecord {
                key,
                posted_at: DateTime::parse_from_rfc3339(&posted_at)
                    .map_err(|e| CoreError::internal(e.to_string()))?
                    .with_timezone(&Utc),
            })
        })
        .transpose()
    }

    /// Number of records currently held.
    pub async fn count(&self) -> CoreResult<u64> {
        let row = query("SELECT COUNT(*) AS n FROM posted_videos")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::ledger_unavailable(e.to_string()))?;

        let n: i64 = row
            .try_get("n")
            .map_err(|e| CoreError::internal(e.to_string()))?;
        Ok(n as u64)
    }

    /// Deletes every record posted strictly before `cutoff`.
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let result = query("DELETE FROM posted_videos WHERE posted_at < ?1")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::ledger_unavailable(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl NotificationLedger for SqliteNotificationLedger {
    async fn is_notified(&self, key: &str) -> CoreResult<bool> {
        let row = query("SELECT COUNT(*) AS n FROM posted_videos WHERE s3_key = ?1")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::ledger_unavailable(e.to_string()))?;

        let n: i64 = row
            .try_get("n")
            .map_err(|e| CoreError::internal(e.to_string()))?;
        Ok(n > 0)
    }

    async fn record_notified(&self, key: &str) -> CoreResult<()> {
        self.record_notified_at(key, Utc::now()).await
    }

    async fn prune_older_than(&self, retention: Duration) -> CoreResult<u64> {
        let removed = self.prune_before(Utc::now() - retention).await?;
        if removed > 0 {
            tracing::info!(removed, retention_days = retention.num_days(), "Pruned ledger records");
        }
        Ok(removed)
    }
}

/// Fixed-width UTC rendering so that SQL string comparison matches time order.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Checks if the error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        db_err.message().contains("UNIQUE constraint failed")
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_ledger() -> SqliteNotificationLedger {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteNotificationLedger::new(pool)
    }

    #[tokio::test]
    async fn test_record_and_check() {
        let ledger = setup_ledger().await;
        let key = "2024/01/01/a.mp4";

        assert!(!ledger.is_notified(key).await.unwrap());
        ledger.record_notified(key).await.unwrap();
        assert!(ledger.is_notified(key).await.unwrap());
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_key() {
        let ledger = setup_ledger().await;
        let key = "2024/01/01/a.mp4";

        ledger.record_notified(key).await.unwrap();
        let err = ledger.record_notified(key).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey(ref k) if k == key));
        assert_eq!(ledger.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prune_retention_boundary() {
        let ledger = setup_ledger().await;
        let now = Utc::now();

        ledger
            .record_notified_at("2024/01/01/old.mp4", now - Duration::days(8))
            .await
            .unwrap();
        ledger
            .record_notified_at("2024/01/03/recent.mp4", now - Duration::days(6))
            .await
            .unwrap();

        let removed = ledger.prune_older_than(Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!ledger.is_notified("2024/01/01/old.mp4").await.unwrap());
        assert!(ledger.is_notified("2024/01/03/recent.mp4").await.unwrap());

        let kept = ledger.get("2024/01/03/recent.mp4").await.unwrap().unwrap();
        assert!(!kept.is_expired(Duration::days(7), Utc::now()));
    }

    #[tokio::test]
    async fn test_get_round_trips_timestamp() {
        let ledger = setup_ledger().await;
        let posted_at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05.678Z")
            .unwrap()
            .with_timezone(&Utc);

        ledger
            .record_notified_at("2024/01/02/b.mp4", posted_at)
            .await
            .unwrap();

        let record = ledger.get("2024/01/02/b.mp4").await.unwrap().unwrap();
        assert_eq!(record.posted_at, posted_at);
        assert!(ledger.get("2024/01/02/missing.mp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_posted_at_is_comparable() {
        let ledger = setup_ledger().await;

        // Rows inserted without an explicit timestamp use the column default
        query("INSERT INTO posted_videos (s3_key) VALUES (?1)")
            .bind("2024/01/05/default.mp4")
            .execute(&ledger.pool)
            .await
            .unwrap();

        let record = ledger.get("2024/01/05/default.mp4").await.unwrap().unwrap();
        assert!(Utc::now() - record.posted_at < Duration::minutes(1));

        assert_eq!(ledger.prune_older_than(Duration::days(7)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_legacy_timestamps_normalized() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        // Table layout written by the earlier notifier
        query(
            "CREATE TABLE posted_videos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                s3_key TEXT UNIQUE NOT NULL,
                posted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        let now = Utc::now();
        let legacy = |ts: DateTime<Utc>| ts.format("%Y-%m-%d %H:%M:%S").to_string();
        for (key, posted_at) in [
            ("2024/01/01/old.mp4", legacy(now - Duration::days(8))),
            ("2024/01/02/edge.mp4", legacy(now - Duration::days(7) + Duration::hours(1))),
        ] {
            query("INSERT INTO posted_videos (s3_key, posted_at) VALUES (?1, ?2)")
                .bind(key)
                .bind(posted_at)
                .execute(&pool)
                .await
                .unwrap();
        }

        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let ledger = SqliteNotificationLedger::new(pool);

        let edge = ledger.get("2024/01/02/edge.mp4").await.unwrap().unwrap();
        assert_eq!(
            edge.posted_at.timestamp(),
            (now - Duration::days(7) + Duration::hours(1)).timestamp()
        );

        // The edge row is an hour inside the retention window
        assert_eq!(ledger.prune_older_than(Duration::days(7)).await.unwrap(), 1);
        assert!(!ledger.is_notified("2024/01/01/old.mp4").await.unwrap());
        assert!(ledger.is_notified("2024/01/02/edge.mp4").await.unwrap());
    }
}
