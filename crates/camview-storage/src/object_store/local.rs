//! Local filesystem implementation of ObjectStore
//!
//! Provides a local directory-based object store for development against a
//! copy of the camera footage. Objects are stored as files with the key as
//! the relative path.

use super::{group_listing, ListResult, ObjectMetadata, ObjectStore, DEFAULT_STORAGE_TIER};
use async_trait::async_trait;
use bytes::Bytes;
use camview_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

/// Local filesystem object store
///
/// # Example
///
/// ```rust,no_run
/// use camview_storage::object_store::{LocalObjectStore, ObjectStore};
/// use bytes::Bytes;
///
/// #[tokio::main]
/// async fn main() -> camview_core::CoreResult<()> {
///     let store = LocalObjectStore::new("./footage").await?;
///     store.put("2024/05/01/cam_0800.mp4", Bytes::from("test")).await?;
///
///     let day = store.list("2024/05/01/", None).await?;
///     println!("Found {} objects", day.objects.len());
///     Ok(())
/// }
/// ```
pub struct LocalObjectStore {
    base_dir: PathBuf,
}

impl LocalObjectStore {
    /// Create a new local object store
    ///
    /// Creates the base directory if it doesn't exist.
    pub async fn new(base_dir: impl AsRef<Path>) -> CoreResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    /// Convert key to full filesystem path, refusing keys that escape the base directory
    fn full_path(&self, key: &str) -> CoreResult<PathBuf> {
        let relative = Path::new(key);
        if !is_plain_relative(relative) {
            return Err(CoreError::ValidationError(format!(
                "key `{key}` is not a plain relative path"
            )));
        }
        Ok(self.base_dir.join(relative))
    }

    /// Strip base directory from path to get a `/`-separated key
    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_dir).ok()?;
        if !is_plain_relative(relative) {
            return None;
        }
        let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }

    /// Recursively list all files under a directory
    fn list_recursive<'a>(
        &'a self,
        dir: &'a Path,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = CoreResult<Vec<PathBuf>>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut results = Vec::new();

            let mut read_dir = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;

                if metadata.is_file() {
                    results.push(path);
                } else if metadata.is_dir() {
                    let mut sub_results = self.list_recursive(&path).await?;
                    results.append(&mut sub_results);
                }
            }

            Ok(results)
        })
    }

    /// Deepest directory that can contain keys starting with `prefix`
    fn search_root(&self, prefix: &str) -> CoreResult<PathBuf> {
        let Some(idx) = prefix.rfind('/') else {
            return Ok(self.base_dir.clone());
        };
        let dir = Path::new(&prefix[..idx]);
        if dir.as_os_str().is_empty() {
            return Ok(self.base_dir.clone());
        }
        if !is_plain_relative(dir) {
            return Err(CoreError::ValidationError(format!(
                "prefix `{prefix}` is not a plain relative path"
            )));
        }
        Ok(self.base_dir.join(dir))
    }
}

/// True when every component is a normal name (no root, `.` or `..`).
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> CoreResult<ListResult> {
        let root = self.search_root(prefix)?;
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Ok(ListResult::default());
        }

        let files = self
            .list_recursive(&root)
            .await
            .map_err(|e| CoreError::store_unavailable(format!("local list failed: {e}")))?;

        let listed_at = Utc::now();
        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let Some(key) = self.path_to_key(&path) else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                entries.push(ObjectMetadata {
                    key,
                    size_bytes: metadata.len(),
                    last_modified: metadata
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                        .and_then(|d| DateTime::from_timestamp(d.as_secs() as i64, 0))
                        .unwrap_or(listed_at),
                    storage_tier: DEFAULT_STORAGE_TIER.to_string(),
                });
            }
        }

        Ok(group_listing(prefix, delimiter, entries))
    }

    async fn get(&self, key: &str) -> CoreResult<Bytes> {
        let path = self.full_path(key)?;

        let data = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::not_found("object", key)
            } else {
                CoreError::from(e)
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn put(&self, key: &str, data: Bytes) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::write_rejected(key, "key cannot be empty"));
        }

        let path = self
            .full_path(key)
            .map_err(|e| CoreError::write_rejected(key, e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::write_rejected(key, e.to_string()))?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| CoreError::write_rejected(key, e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        let path = self.full_path(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::from(e)),
        }
    }

    async fn presign(&self, key: &str, _ttl: Duration) -> CoreResult<String> {
        let path = self.full_path(key)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(CoreError::not_found("object", key));
        }

        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(format!("file://{}", absolute.display()))
    }
}
