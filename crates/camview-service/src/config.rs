//! Configuration for the camview notifier and archive service.
//!
//! Supports multiple configuration sources with precedence:
//! 1. Environment variables (highest priority)
//! 2. TOML configuration file (`camview.toml`, or the path in `CAMVIEW_CONFIG`)
//! 3. Default values (lowest priority)
//!
//! The process entry point builds one [`NotifierConfig`] and hands the pieces
//! to each component. Nothing else reads the environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camview_storage::S3Config;
use serde::{Deserialize, Serialize};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "camview.toml";

/// Upper bound S3 accepts for a presigned URL lifetime (7 days).
const MAX_PRESIGN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Object store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Outbound webhook
    #[serde(default)]
    pub sink: SinkConfig,

    /// Notification ledger database
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Archive query surface
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bucket holding the footage (required)
    #[serde(default)]
    pub bucket: String,

    /// AWS region (default: "us-east-1")
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom S3-compatible endpoint, e.g. MinIO
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static access key; the default provider chain is used when unset
    #[serde(default)]
    pub access_key: Option<String>,

    /// Static secret key
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Webhook sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Webhook URL (required)
    #[serde(default)]
    pub webhook_url: String,

    /// HTTP timeout in seconds (default: 10)
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,

    /// Pause after each successful send, in milliseconds (default: 2000)
    #[serde(default = "default_send_delay")]
    pub send_delay_ms: u64,
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite file path or URL (default: "./discord-notifier.db")
    #[serde(default = "default_ledger_path")]
    pub path: String,

    /// Days a record is kept before pruning (default: 7)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

/// Archive query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Presigned URL lifetime in seconds (default: 3600)
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_seconds: u64,

    /// Days covered by a statistics request without explicit bounds (default: 30)
    #[serde(default = "default_stats_window")]
    pub default_stats_days: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty (default: "pretty")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_send_delay() -> u64 {
    2000
}

fn default_ledger_path() -> String {
    "./discord-notifier.db".to_string()
}

fn default_retention_days() -> u32 {
    7
}

fn default_presign_ttl() -> u64 {
    3600
}

fn default_stats_window() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            timeout_seconds: default_http_timeout(),
            send_delay_ms: default_send_delay(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            presign_ttl_seconds: default_presign_ttl(),
            default_stats_days: default_stats_window(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl StoreConfig {
    /// Gateway configuration for this store.
    pub fn to_s3_config(&self) -> S3Config {
        let mut config = S3Config::aws(self.bucket.clone(), self.region.clone());
        config.endpoint = self.endpoint.clone();
        if let (Some(access), Some(secret)) = (&self.access_key, &self.secret_key) {
            config = config.with_credentials(access.clone(), secret.clone());
        }
        config
    }
}

impl SinkConfig {
    /// HTTP timeout for one webhook call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Pause after a successful send.
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

impl LedgerConfig {
    /// Retention window as a calendar duration.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

impl ArchiveConfig {
    /// Lifetime of presigned download URLs.
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_seconds)
    }
}

impl NotifierConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file doesn't exist or has invalid TOML syntax.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError { path, source: e })
    }

    /// Build configuration from defaults plus the given variables.
    ///
    /// Does not consult the process environment or the filesystem.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Self {
        let mut config = Self::default();
        config.apply_overrides(vars);
        config
    }

    /// Load configuration from the process environment.
    ///
    /// Reads the TOML file named by `CAMVIEW_CONFIG`, or `camview.toml` when it
    /// exists, then applies environment overrides and validates the result.
    ///
    /// Supported environment variables:
    /// - `BUCKET_NAME` - bucket holding the footage
    /// - `AWS_REGION` - bucket region
    /// - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` - static credentials
    /// - `S3_ENDPOINT` - custom S3-compatible endpoint
    /// - `DISCORD_WEBHOOK_URL` - webhook that receives notifications
    /// - `NOTIFIER_DB_PATH` - ledger database path
    /// - `NOTIFIER_RETENTION_DAYS` - ledger retention window
    /// - `NOTIFIER_SEND_DELAY_MS` - pause after each successful send
    /// - `NOTIFIER_HTTP_TIMEOUT_SECS` - webhook HTTP timeout
    /// - `PRESIGN_TTL_SECS` - presigned URL lifetime
    /// - `CAMVIEW_LOG_LEVEL` / `CAMVIEW_LOG_FORMAT` - logging
    pub fn load() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();

        let mut config = match vars.get("CAMVIEW_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        config.apply_overrides(&vars);
        config.validate()?;

        Ok(config)
    }

    /// Apply overrides from a variable map.
    ///
    /// Unparseable numeric values leave the current setting untouched.
    pub fn apply_overrides(&mut self, vars: &HashMap<String, String>) {
        let get = |name: &str| vars.get(name).filter(|v| !v.is_empty());

        if let Some(bucket) = get("BUCKET_NAME") {
            self.store.bucket = bucket.clone();
        }

        if let Some(region) = get("AWS_REGION") {
            self.store.region = region.clone();
        }

        if let Some(endpoint) = get("S3_ENDPOINT") {
            self.store.endpoint = Some(endpoint.clone());
        }

        if let Some(access) = get("AWS_ACCESS_KEY_ID") {
            self.store.access_key = Some(access.clone());
        }

        if let Some(secret) = get("AWS_SECRET_ACCESS_KEY") {
            self.store.secret_key = Some(secret.clone());
        }

        if let Some(url) = get("DISCORD_WEBHOOK_URL") {
            self.sink.webhook_url = url.clone();
        }

        if let Some(timeout) = get("NOTIFIER_HTTP_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.sink.timeout_seconds = timeout;
            }
        }

        if let Some(delay) = get("NOTIFIER_SEND_DELAY_MS") {
            if let Ok(delay) = delay.parse() {
                self.sink.send_delay_ms = delay;
            }
        }

        if let Some(path) = get("NOTIFIER_DB_PATH") {
            self.ledger.path = path.clone();
        }

        if let Some(days) = get("NOTIFIER_RETENTION_DAYS") {
            if let Ok(days) = days.parse() {
                self.ledger.retention_days = days;
            }
        }

        if let Some(ttl) = get("PRESIGN_TTL_SECS") {
            if let Ok(ttl) = ttl.parse() {
                self.archive.presign_ttl_seconds = ttl;
            }
        }

        if let Some(level) = get("CAMVIEW_LOG_LEVEL") {
            self.logging.level = level.clone();
        }

        if let Some(format) = get("CAMVIEW_LOG_FORMAT") {
            self.logging.format = format.clone();
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.bucket is required (set BUCKET_NAME)".to_string(),
            ));
        }

        if self.store.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.region cannot be empty".to_string(),
            ));
        }

        if self.sink.webhook_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sink.webhook_url is required (set DISCORD_WEBHOOK_URL)".to_string(),
            ));
        }

        if !self.sink.webhook_url.starts_with("http://")
            && !self.sink.webhook_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "sink.webhook_url must be an http(s) URL".to_string(),
            ));
        }

        if self.sink.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "sink.timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.ledger.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ledger.path cannot be empty".to_string(),
            ));
        }

        if self.ledger.retention_days == 0 {
            return Err(ConfigError::ValidationError(
                "ledger.retention_days must be > 0".to_string(),
            ));
        }

        if self.archive.presign_ttl_seconds == 0
            || self.archive.presign_ttl_seconds > MAX_PRESIGN_TTL_SECS
        {
            return Err(ConfigError::ValidationError(format!(
                "archive.presign_ttl_seconds must be between 1 and {MAX_PRESIGN_TTL_SECS}"
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of: {}",
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file
    #[error("Failed to read config file {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Failed to parse TOML in {path:?}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
