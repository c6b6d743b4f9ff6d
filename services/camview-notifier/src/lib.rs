//! One-shot notifier: scan recent partitions and announce new uploads.
//!
//! Intended to be run periodically by an external scheduler. Each run opens
//! the ledger, performs a single pass and exits.

pub mod logging;

use std::sync::Arc;

use camview_core::CoreError;
use camview_metadata::SqliteNotificationLedger;
use camview_service::{
    ConfigError, DispatcherOptions, NotificationDispatcher, NotifierConfig, PassReport,
    WebhookSink,
};
use camview_storage::{ObjectStore, S3ObjectStore};

/// Failures that prevent a pass from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open notification ledger: {0}")]
    Ledger(#[source] CoreError),

    #[error("failed to configure object store: {0}")]
    Store(#[source] CoreError),

    #[error("failed to configure webhook sink: {0}")]
    Sink(#[source] CoreError),
}

/// Builds the S3-backed components from `config` and runs one pass.
///
/// Send failures do not make the run fail; only startup does.
pub async fn run(config: &NotifierConfig) -> Result<PassReport, StartupError> {
    let store: Arc<dyn ObjectStore> = Arc::new(
        S3ObjectStore::new(config.store.to_s3_config())
            .await
            .map_err(StartupError::Store)?,
    );

    run_with_store(config, store).await
}

/// Runs one pass against an already constructed store.
pub async fn run_with_store(
    config: &NotifierConfig,
    store: Arc<dyn ObjectStore>,
) -> Result<PassReport, StartupError> {
    config.validate()?;

    let ledger = SqliteNotificationLedger::open(&config.ledger.path)
        .await
        .map_err(StartupError::Ledger)?;
    let sink = WebhookSink::new(config.sink.webhook_url.clone(), config.sink.timeout())
        .map_err(StartupError::Sink)?;

    tracing::info!(
        bucket = %config.store.bucket,
        ledger = %config.ledger.path,
        retention_days = config.ledger.retention_days,
        "Starting notification pass"
    );

    let dispatcher = NotificationDispatcher::new(
        store,
        Arc::new(ledger.clone()),
        Arc::new(sink),
        DispatcherOptions {
            bucket: config.store.bucket.clone(),
            retention: config.ledger.retention(),
            send_delay: config.sink.send_delay(),
        },
    );

    let report = dispatcher.run_pass().await;
    ledger.close().await;

    Ok(report)
}
