//! AWS S3 implementation of ObjectStore
//!
//! Supports standard AWS S3 and S3-compatible endpoints (MinIO, Wasabi, etc.).

use std::time::Duration;

use super::{ListResult, ObjectMetadata, ObjectStore, DEFAULT_STORAGE_TIER};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{config::Credentials, primitives::ByteStream, Client};
use bytes::Bytes;
use camview_core::{CoreError, CoreResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// S3 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region (e.g., "us-east-1")
    pub region: String,
    /// Optional custom endpoint URL (for MinIO compatibility)
    ///
    /// Examples:
    /// - MinIO: "http://localhost:9000"
    /// - Wasabi: "https://s3.wasabisys.com"
    pub endpoint: Option<String>,
    /// Optional static access key
    pub access_key: Option<String>,
    /// Optional static secret key
    pub secret_key: Option<String>,
}

impl S3Config {
    /// Create config for standard AWS S3 (uses the default credential chain)
    pub fn aws(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }

    /// Create config for MinIO or custom S3-compatible endpoint
    pub fn custom(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: Some(endpoint.into()),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
        }
    }

    /// Use static credentials instead of the default provider chain
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Static credentials are used only when both halves are present.
    fn static_credentials(&self) -> Option<Credentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => Some(
                Credentials::new(access, secret, None, None, "camview-static"),
            ),
            _ => None,
        }
    }
}

/// AWS S3 object store
///
/// # Examples
///
/// ```rust,no_run
/// use camview_storage::object_store::{ObjectStore, S3Config, S3ObjectStore};
///
/// #[tokio::main]
/// async fn main() -> camview_core::CoreResult<()> {
///     let store = S3ObjectStore::new(S3Config::aws("camera-footage", "us-east-1")).await?;
///     let days = store.list("2024/01/", Some("/")).await?;
///     println!("{} day partitions", days.common_prefixes.len());
///     Ok(())
/// }
/// ```
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub async fn new(config: S3Config) -> CoreResult<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(creds) = config.static_credentials() {
            loader = loader.credentials_provider(creds);
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);

        if let Some(endpoint) = &config.endpoint {
            // Path-style addressing is required by MinIO
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 client configured"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
        })
    }

    /// Bucket this store reads from and writes to
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str, delimiter: Option<&str>) -> CoreResult<ListResult> {
        let mut req = self.client.list_objects_v2().bucket(&self.bucket);
        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }
        if let Some(delimiter) = delimiter {
            req = req.delimiter(delimiter);
        }

        let resp = req.send().await.map_err(|e| {
            CoreError::store_unavailable(format!(
                "S3 list of `{prefix}` failed: {}",
                DisplayErrorContext(&e)
            ))
        })?;

        // Missing timestamps default to the time of this call
        let listed_at = Utc::now();

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                let last_modified = obj
                    .last_modified()
                    .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or(listed_at);

                Some(ObjectMetadata {
                    key,
                    size_bytes: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified,
                    storage_tier: obj
                        .storage_class()
                        .map(|class| class.as_str().to_string())
                        .unwrap_or_else(|| DEFAULT_STORAGE_TIER.to_string()),
                })
            })
            .collect();

        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(ListResult {
            objects,
            common_prefixes,
        })
    }

    async fn get(&self, key: &str) -> CoreResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    CoreError::not_found("object", key)
                } else {
                    CoreError::store_unavailable(format!(
                        "S3 get failed: {}",
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| CoreError::store_unavailable(format!("S3 read failed: {e}")))?
            .into_bytes();

        Ok(data)
    }

    async fn put(&self, key: &str, data: Bytes) -> CoreResult<()> {
        if key.is_empty() {
            return Err(CoreError::write_rejected(key, "key cannot be empty"));
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| match e {
                // The store answered and refused the write
                SdkError::ServiceError(_) => {
                    CoreError::write_rejected(key, DisplayErrorContext(&e).to_string())
                }
                other => CoreError::store_unavailable(format!(
                    "S3 put failed: {}",
                    DisplayErrorContext(&other)
                )),
            })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        // S3 delete is idempotent (no error if object doesn't exist)
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                CoreError::store_unavailable(format!(
                    "S3 delete failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> CoreResult<String> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                return Err(CoreError::not_found("object", key));
            }
            Err(e) => {
                // Existence check is best effort; presigning itself is local
                tracing::warn!(
                    key = %key,
                    error = %DisplayErrorContext(&e),
                    "HEAD before presign failed, presigning anyway"
                );
            }
        }

        let presign_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| CoreError::ValidationError(format!("invalid presign TTL: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| {
                CoreError::internal(format!("S3 presign failed: {}", DisplayErrorContext(&e)))
            })?;

        Ok(request.uri().to_string())
    }
}
