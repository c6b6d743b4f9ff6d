//! Virtual year/month/day hierarchy over a flat key namespace.
//!
//! Every level is one delimited listing against the object store; nothing is
//! cached between calls.

use std::collections::BTreeSet;
use std::sync::Arc;

use camview_core::{encode, is_media_key, prefix_for_date, CoreError, CoreResult, DELIMITER};
use camview_storage::{ObjectMetadata, ObjectStore};
use chrono::NaiveDate;

/// Partition queries backed by prefix/delimiter listings.
#[derive(Clone)]
pub struct PartitionIndex {
    store: Arc<dyn ObjectStore>,
}

impl PartitionIndex {
    /// Creates an index over `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Distinct year partitions, e.g. `{"2023", "2024"}`.
    pub async fn list_years(&self) -> CoreResult<BTreeSet<String>> {
        self.child_partitions("").await
    }

    /// Distinct month partitions under `year`, e.g. `{"01", "02"}`.
    pub async fn list_months(&self, year: u16) -> CoreResult<BTreeSet<String>> {
        self.child_partitions(&format!("{year:04}{DELIMITER}")).await
    }

    /// Distinct day partitions under `year/month`.
    pub async fn list_days(&self, year: u16, month: u8) -> CoreResult<BTreeSet<String>> {
        self.child_partitions(&format!("{year:04}{DELIMITER}{month:02}{DELIMITER}"))
            .await
    }

    /// Media objects stored under one day partition, in key order.
    pub async fn list_objects(
        &self,
        year: u16,
        month: u8,
        day: u8,
    ) -> CoreResult<Vec<ObjectMetadata>> {
        self.media_under(&encode(year, month, day)).await
    }

    /// Media objects stored under the partition for `date`.
    pub async fn list_objects_on(&self, date: NaiveDate) -> CoreResult<Vec<ObjectMetadata>> {
        self.media_under(&prefix_for_date(date)).await
    }

    /// The lexicographically greatest media key in a day partition.
    ///
    /// Ordering is by key, not by last-modified time.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` when the partition holds no media.
    pub async fn latest(&self, year: u16, month: u8, day: u8) -> CoreResult<ObjectMetadata> {
        let prefix = encode(year, month, day);
        self.media_under(&prefix)
            .await?
            .into_iter()
            .max_by(|a, b| a.key.cmp(&b.key))
            .ok_or_else(|| CoreError::not_found("partition", prefix))
    }

    async fn media_under(&self, prefix: &str) -> CoreResult<Vec<ObjectMetadata>> {
        let listing = self.store.list(prefix, None).await?;
        let total = listing.objects.len();

        let media: Vec<ObjectMetadata> = listing
            .objects
            .into_iter()
            .filter(|object| is_media_key(&object.key))
            .collect();

        tracing::debug!(
            prefix = %prefix,
            listed = total,
            media = media.len(),
            "Listed day partition"
        );
        Ok(media)
    }

    async fn child_partitions(&self, prefix: &str) -> CoreResult<BTreeSet<String>> {
        let listing = self.store.list(prefix, Some(DELIMITER)).await?;

        Ok(listing
            .common_prefixes
            .iter()
            .filter_map(|common| {
                common
                    .strip_prefix(prefix)?
                    .strip_suffix(DELIMITER)
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            })
            .collect())
    }
}
