//! Archive queries and the new-upload notification pipeline.
//!
//! This crate wires the key codec, the object store gateway and the ledger
//! into the components the process entry point runs:
//!
//! - [`PartitionIndex`]: year/month/day listings over a flat bucket
//! - [`Aggregator`]: per-day and per-range statistics
//! - [`ArchiveService`]: serialisable query surface
//! - [`NotificationDispatcher`]: deduplicated notifications for new uploads

pub mod aggregator;
pub mod archive;
pub mod config;
pub mod dispatcher;
pub mod format;
pub mod partition_index;
pub mod sink;

pub use aggregator::{Aggregator, DailyStat, StatsReport, StatsSummary};
pub use archive::{
    ArchiveService, BucketListing, DayListing, FileEntry, LatestResponse, PartitionListing,
    PresignedUrl,
};
pub use config::{
    ArchiveConfig, ConfigError, LedgerConfig, LoggingConfig, NotifierConfig, SinkConfig,
    StoreConfig,
};
pub use dispatcher::{DispatcherOptions, NotificationDispatcher, PassReport};
pub use format::format_size;
pub use partition_index::PartitionIndex;
pub use sink::{NotificationField, NotificationMessage, NotificationSink, WebhookSink};
