//! Object Store abstraction for S3-compatible storage
//!
//! Provides a unified interface for object storage operations with multiple backends:
//! - AWS S3 (production)
//! - MinIO (S3-compatible)
//! - Local filesystem (development)
//! - In-memory mock (testing)

mod local;
mod mock;
mod s3;

pub use local::LocalObjectStore;
pub use mock::{CallHistoryEntry, MockFailure, MockObjectStore, MockStoreConfig};
pub use s3::{S3Config, S3ObjectStore};

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use camview_core::CoreResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage tier reported when the backend does not expose one.
pub const DEFAULT_STORAGE_TIER: &str = "STANDARD";

/// Object metadata returned by list operations
///
/// Snapshot taken from a single listing call. Optional SDK fields are
/// defaulted by the backend that produced it, never downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Object key (path)
    pub key: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Last modification timestamp
    pub last_modified: DateTime<Utc>,
    /// Storage class (e.g. `STANDARD`, `GLACIER`)
    pub storage_tier: String,
}

/// Result of one listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResult {
    /// Objects directly under the prefix (all objects when no delimiter was given).
    pub objects: Vec<ObjectMetadata>,
    /// Distinct `prefix + segment + delimiter` groups, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
}

/// Object Store trait - S3-like interface for cloud/local storage
///
/// All implementations must be thread-safe (Send + Sync). Keys are UTF-8
/// strings treated as opaque identifiers.
///
/// # Error Handling
///
/// - `CoreError::StoreUnavailable` - listing or transport failure
/// - `CoreError::NotFound` - object does not exist (get, presign)
/// - `CoreError::WriteRejected` - the store refused a put
///
/// # Examples
///
/// ```rust,no_run
/// use camview_storage::object_store::{LocalObjectStore, ObjectStore};
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() -> camview_core::CoreResult<()> {
///     let store = LocalObjectStore::new("./data").await?;
///
///     store.put("2024/01/15/clip.mp4", Bytes::from("frames")).await?;
///
///     // Group by the first path segment
///     let years = store.list("", Some("/")).await?;
///     assert_eq!(years.common_prefixes, vec!["2024/".to_string()]);
///
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects whose keys start with `prefix`
    ///
    /// When `delimiter` is given, keys that contain the delimiter after the
    /// prefix are collapsed into `common_prefixes` and left out of `objects`.
    /// Returns a single page; continuation is not followed.
    ///
    /// # Errors
    ///
    /// - `CoreError::StoreUnavailable` if the listing fails
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> CoreResult<ListResult>;

    /// Get object
    ///
    /// # Errors
    ///
    /// - `CoreError::NotFound` if object does not exist
    /// - `CoreError::StoreUnavailable` if the operation fails
    async fn get(&self, key: &str) -> CoreResult<Bytes>;

    /// Put object (overwrites if exists)
    ///
    /// # Errors
    ///
    /// - `CoreError::WriteRejected` on quota, permission or empty-key errors
    /// - `CoreError::StoreUnavailable` on transport failure
    async fn put(&self, key: &str, data: Bytes) -> CoreResult<()>;

    /// Delete object (idempotent)
    ///
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// Time-limited download URL for `key`
    ///
    /// # Errors
    ///
    /// - `CoreError::NotFound` when the backend can tell the object is missing
    async fn presign(&self, key: &str, ttl: Duration) -> CoreResult<String>;
}

/// Apply S3 prefix/delimiter semantics to an already prefix-filtered entry set.
///
/// Used by backends that do not group natively. Objects are returned in key
/// order, matching S3 listing order.
pub(crate) fn group_listing(
    prefix: &str,
    delimiter: Option<&str>,
    entries: impl IntoIterator<Item = ObjectMetadata>,
) -> ListResult {
    let mut objects = Vec::new();
    let mut common_prefixes = BTreeSet::new();

    for entry in entries {
        let Some(rest) = entry.key.strip_prefix(prefix) else {
            continue;
        };

        match delimiter.filter(|d| !d.is_empty()).and_then(|d| {
            rest.find(d).map(|idx| idx + d.len())
        }) {
            Some(end) => {
                common_prefixes.insert(format!("{prefix}{}", &rest[..end]));
            }
            None => objects.push(entry),
        }
    }

    objects.sort_by(|a, b| a.key.cmp(&b.key));

    ListResult {
        objects,
        common_prefixes: common_prefixes.into_iter().collect(),
    }
}
