//! Object store gateway for the camview archive.
//!
//! The gateway is a stateless, capability-typed facade over an S3-compatible
//! bucket. It performs no date logic; partitioning lives in `camview-service`.

pub mod object_store;

pub use object_store::{
    CallHistoryEntry, ListResult, LocalObjectStore, MockFailure, MockObjectStore,
    MockStoreConfig, ObjectMetadata, ObjectStore, S3Config, S3ObjectStore, DEFAULT_STORAGE_TIER,
};
