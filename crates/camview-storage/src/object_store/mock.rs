//! In-memory ObjectStore for testing
//!
//! Simulates an S3 bucket with configurable failure patterns so the partition
//! index, aggregator and notifier can be exercised without AWS or MinIO.
//!
//! # Features
//!
//! - **Deterministic Failures**: pre-defined failure sequence consumed per call
//! - **Prefix Failures**: listings under a given prefix always fail
//! - **Call History**: every operation is recorded for assertions
//! - **Seeded Metadata**: objects can carry explicit timestamps and storage tiers
//!
//! # Examples
//!
//! ```rust
//! use camview_storage::object_store::{MockFailure, MockObjectStore, ObjectStore};
//! use bytes::Bytes;
//!
//! # async fn example() -> camview_core::CoreResult<()> {
//! let mock = MockObjectStore::new_with_failures(vec![
//!     MockFailure::Unavailable("503 Service Unavailable"),
//!     MockFailure::Ok,
//! ]);
//!
//! assert!(mock.put("2024/01/01/a.mp4", Bytes::from("x")).await.is_err());
//! assert!(mock.put("2024/01/01/a.mp4", Bytes::from("x")).await.is_ok());
//! assert_eq!(mock.get_call_history().len(), 2);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{group_listing, ListResult, ObjectMetadata, ObjectStore, DEFAULT_STORAGE_TIER};
use camview_core::{CoreError, CoreResult};

/// Mock store failure pattern.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// Transport or service outage. Surfaces as `StoreUnavailable`.
    Unavailable(&'static str),

    /// The store refuses the write. Surfaces as `WriteRejected` on put and
    /// `StoreUnavailable` elsewhere.
    Rejected(&'static str),

    /// Success (no error).
    Ok,
}

impl MockFailure {
    fn to_error(&self, operation: &str, key: &str) -> Option<CoreError> {
        match self {
            MockFailure::Unavailable(msg) => Some(CoreError::store_unavailable(*msg)),
            MockFailure::Rejected(msg) if operation == "put" => {
                Some(CoreError::write_rejected(key, *msg))
            }
            MockFailure::Rejected(msg) => Some(CoreError::store_unavailable(*msg)),
            MockFailure::Ok => None,
        }
    }
}

/// Mock store configuration.
#[derive(Debug, Clone)]
pub struct MockStoreConfig {
    /// Enable call history tracking.
    pub track_history: bool,

    /// Base URL used for presigned links.
    pub presign_base_url: String,
}

impl Default for MockStoreConfig {
    fn default() -> Self {
        Self {
            track_history: true,
            presign_base_url: "https://mock-bucket.local".to_string(),
        }
    }
}

/// Mock call history entry.
#[derive(Debug, Clone)]
pub struct CallHistoryEntry {
    /// Operation type: "list", "get", "put", "delete", "presign".
    pub operation: String,

    /// Object key, or the prefix for listings.
    pub key: String,

    /// Whether operation succeeded.
    pub success: bool,

    /// Timestamp of operation.
    pub timestamp: Instant,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    storage_tier: String,
}

/// In-memory ObjectStore implementation for testing.
///
/// Clones share the same bucket, failure queue and history.
#[derive(Clone)]
pub struct MockObjectStore {
    storage: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    failure_queue: Arc<RwLock<VecDeque<MockFailure>>>,
    failing_prefixes: Arc<RwLock<HashSet<String>>>,
    config: MockStoreConfig,
    call_history: Arc<RwLock<Vec<CallHistoryEntry>>>,
}

impl MockObjectStore {
    /// Create new mock store with default config (no failures).
    pub fn new() -> Self {
        Self::new_with_config(MockStoreConfig::default())
    }

    /// Create new mock store with custom config.
    pub fn new_with_config(config: MockStoreConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(BTreeMap::new())),
            failure_queue: Arc::new(RwLock::new(VecDeque::new())),
            failing_prefixes: Arc::new(RwLock::new(HashSet::new())),
            config,
            call_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create mock store with deterministic failure pattern.
    ///
    /// Failures are consumed in order by any operation. Once the queue is
    /// empty, all operations succeed.
    pub fn new_with_failures(pattern: Vec<MockFailure>) -> Self {
        let mock = Self::new();
        *mock.failure_queue.write() = pattern.into();
        mock
    }

    /// Seed an object with explicit metadata, bypassing failure injection.
    pub fn insert_object(
        &self,
        key: impl Into<String>,
        data: Bytes,
        last_modified: DateTime<Utc>,
        storage_tier: impl Into<String>,
    ) {
        self.storage.write().insert(
            key.into(),
            StoredObject {
                data,
                last_modified,
                storage_tier: storage_tier.into(),
            },
        );
    }

    /// Seed an object of `size` zero bytes in the default tier.
    pub fn insert_sized(&self, key: impl Into<String>, size: usize) {
        self.insert_object(
            key,
            Bytes::from(vec![0u8; size]),
            Utc::now(),
            DEFAULT_STORAGE_TIER,
        );
    }

    /// Make every listing whose prefix equals `prefix` fail with `StoreUnavailable`.
    pub fn fail_prefix(&self, prefix: impl Into<String>) {
        self.failing_prefixes.write().insert(prefix.into());
    }

    /// Stop failing listings under `prefix`.
    pub fn heal_prefix(&self, prefix: &str) {
        self.failing_prefixes.write().remove(prefix);
    }

    /// Get call history for assertions.
    pub fn get_call_history(&self) -> Vec<CallHistoryEntry> {
        self.call_history.read().clone()
    }

    /// Clear call history.
    pub fn clear_history(&self) {
        self.call_history.write().clear();
    }

    /// Number of recorded calls for `operation`.
    pub fn calls(&self, operation: &str) -> usize {
        self.call_history
            .read()
            .iter()
            .filter(|entry| entry.operation == operation)
            .count()
    }

    /// Get current storage size (number of objects).
    pub fn storage_size(&self) -> usize {
        self.storage.read().len()
    }

    /// Check if key exists in storage.
    pub fn contains_key(&self, key: &str) -> bool {
        self.storage.read().contains_key(key)
    }

    fn simulate(&self, operation: &str, key: &str) -> CoreResult<()> {
        let failure = self.failure_queue.write().pop_front();
        if let Some(error) = failure.and_then(|f| f.to_error(operation, key)) {
            self.record_call(operation, key, false);
            return Err(error);
        }
        Ok(())
    }

    fn record_call(&self, operation: &str, key: &str, success: bool) {
        if self.config.track_history {
            self.call_history.write().push(CallHistoryEntry {
                operation: operation.to_string(),
                key: key.to_string(),
                success,
                timestamp: Instant::now(),
            });
        }
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> CoreResult<ListResult> {
        self.simulate("list", prefix)?;

        if self.failing_prefixes.read().contains(prefix) {
            self.record_call("list", prefix, false);
            return Err(CoreError::store_unavailable(format!(
                "simulated outage listing `{prefix}`"
            )));
        }

        let entries: Vec<ObjectMetadata> = self
            .storage
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectMetadata {
                key: k.clone(),
                size_bytes: v.data.len() as u64,
                last_modified: v.last_modified,
                storage_tier: v.storage_tier.clone(),
            })
            .collect();

        self.record_call("list", prefix, true);
        Ok(group_listing(prefix, delimiter, entries))
    }

    async fn get(&self, key: &str) -> CoreResult<Bytes> {
        self.simulate("get", key)?;

        let found = self.storage.read().get(key).map(|o| o.data.clone());
        self.record_call("get", key, found.is_some());
        found.ok_or_else(|| CoreError::not_found("object", key))
    }

    async fn put(&self, key: &str, data: Bytes) -> CoreResult<()> {
        if key.is_empty() {
            self.record_call("put", key, false);
            return Err(CoreError::write_rejected(key, "key cannot be empty"));
        }
        self.simulate("put", key)?;

        self.insert_object(key, data, Utc::now(), DEFAULT_STORAGE_TIER);
        self.record_call("put", key, true);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.simulate("delete", key)?;

        self.storage.write().remove(key);
        self.record_call("delete", key, true);
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> CoreResult<String> {
        self.simulate("presign", key)?;

        if !self.contains_key(key) {
            self.record_call("presign", key, false);
            return Err(CoreError::not_found("object", key));
        }

        self.record_call("presign", key, true);
        Ok(format!(
            "{}/{}?expires_in={}",
            self.config.presign_base_url.trim_end_matches('/'),
            key,
            ttl.as_secs()
        ))
    }
}
