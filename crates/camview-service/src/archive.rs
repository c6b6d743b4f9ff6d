//! Query surface for browsing the archive.
//!
//! Every method returns a serialisable response so a routing layer can hand
//! it straight to a JSON encoder.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use camview_core::{CoreError, CoreResult};
use camview_storage::{ObjectMetadata, ObjectStore};
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::{Aggregator, StatsReport};
use crate::config::ArchiveConfig;
use crate::partition_index::PartitionIndex;

/// Partition names at one hierarchy level, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionListing {
    pub partitions: Vec<String>,
}

/// One file in a day listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub key: String,
    pub filename: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub storage_class: String,
}

impl From<ObjectMetadata> for FileEntry {
    fn from(object: ObjectMetadata) -> Self {
        Self {
            filename: base_name(&object.key).to_string(),
            key: object.key,
            size: object.size_bytes,
            last_modified: object.last_modified,
            storage_class: object.storage_tier,
        }
    }
}

/// Last `/`-separated segment of `key`, so nested keys list by their bare file name.
fn base_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Media files stored under one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayListing {
    /// `YYYY-MM-DD`
    pub date: String,
    pub files: Vec<FileEntry>,
    pub count: usize,
}

/// Most recent media file for today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestResponse {
    pub date: String,
    pub found: bool,
    pub file: Option<FileEntry>,
}

/// Every key in one listing page of the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketListing {
    pub keys: Vec<String>,
    pub count: usize,
}

/// Time-limited download link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrl {
    pub key: String,
    pub url: String,
    pub expires_in_seconds: u64,
}

/// Read-mostly view over the footage bucket.
#[derive(Clone)]
pub struct ArchiveService {
    store: Arc<dyn ObjectStore>,
    index: PartitionIndex,
    aggregator: Aggregator,
    presign_ttl: Duration,
}

impl ArchiveService {
    pub fn new(store: Arc<dyn ObjectStore>, config: &ArchiveConfig) -> Self {
        let index = PartitionIndex::new(store.clone());
        Self {
            aggregator: Aggregator::new(index.clone(), config.default_stats_days),
            index,
            store,
            presign_ttl: config.presign_ttl(),
        }
    }

    pub async fn list_years(&self) -> CoreResult<PartitionListing> {
        let partitions = self.index.list_years().await?;
        Ok(PartitionListing {
            partitions: partitions.into_iter().collect(),
        })
    }

    pub async fn list_months(&self, year: u16) -> CoreResult<PartitionListing> {
        let partitions = self.index.list_months(year).await?;
        Ok(PartitionListing {
            partitions: partitions.into_iter().collect(),
        })
    }

    pub async fn list_days(&self, year: u16, month: u8) -> CoreResult<PartitionListing> {
        let partitions = self.index.list_days(year, month).await?;
        Ok(PartitionListing {
            partitions: partitions.into_iter().collect(),
        })
    }

    /// Media files under one day partition.
    pub async fn list_objects(&self, year: u16, month: u8, day: u8) -> CoreResult<DayListing> {
        let files: Vec<FileEntry> = self
            .index
            .list_objects(year, month, day)
            .await?
            .into_iter()
            .map(FileEntry::from)
            .collect();

        Ok(DayListing {
            date: format!("{year:04}-{month:02}-{day:02}"),
            count: files.len(),
            files,
        })
    }

    /// Lexicographically greatest media file of a day.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` for a day without media.
    pub async fn latest(&self, year: u16, month: u8, day: u8) -> CoreResult<FileEntry> {
        Ok(self.index.latest(year, month, day).await?.into())
    }

    /// Latest media file for the local calendar date.
    pub async fn latest_today(&self) -> CoreResult<LatestResponse> {
        self.latest_on(Local::now().date_naive()).await
    }

    /// Latest media file for `date`; an empty day yields `found: false`.
    pub async fn latest_on(&self, date: NaiveDate) -> CoreResult<LatestResponse> {
        let year = u16::try_from(date.year())
            .map_err(|_| CoreError::ValidationError(format!("year of {date} is out of range")))?;
        let file = match self.latest(year, date.month() as u8, date.day() as u8).await {
            Ok(file) => Some(file),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        Ok(LatestResponse {
            date: date.format("%Y-%m-%d").to_string(),
            found: file.is_some(),
            file,
        })
    }

    /// Statistics over `[start, end]`; see [`Aggregator::stats`] for defaults.
    pub async fn stats(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> CoreResult<StatsReport> {
        self.aggregator.stats(start, end).await
    }

    /// Download URL valid for the configured TTL.
    pub async fn presign(&self, key: &str) -> CoreResult<PresignedUrl> {
        self.presign_for(key, self.presign_ttl).await
    }

    pub async fn presign_for(&self, key: &str, ttl: Duration) -> CoreResult<PresignedUrl> {
        let url = self.store.presign(key, ttl).await?;
        Ok(PresignedUrl {
            key: key.to_string(),
            url,
            expires_in_seconds: ttl.as_secs(),
        })
    }

    /// Every key returned by one unfiltered listing.
    pub async fn list_bucket(&self) -> CoreResult<BucketListing> {
        let keys: Vec<String> = self
            .store
            .list("", None)
            .await?
            .objects
            .into_iter()
            .map(|object| object.key)
            .collect();

        Ok(BucketListing {
            count: keys.len(),
            keys,
        })
    }

    pub async fn upload(&self, key: &str, data: Bytes) -> CoreResult<()> {
        let size = data.len();
        self.store.put(key, data).await?;
        tracing::info!(key = %key, size, "Uploaded object");
        Ok(())
    }

    pub async fn download(&self, key: &str) -> CoreResult<Bytes> {
        self.store.get(key).await
    }

    pub async fn delete(&self, key: &str) -> CoreResult<()> {
        self.store.delete(key).await?;
        tracing::info!(key = %key, "Deleted object");
        Ok(())
    }
}
