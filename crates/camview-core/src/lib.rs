//! Core domain types and traits for the camview archive and notifier.

pub mod error;
pub mod key;
pub mod notification;
pub mod traits;

pub use error::{CoreError, CoreResult};
pub use key::{
    derived_date, display_name, encode, is_media_key, prefix_for_date, KeyError, PartitionKey,
    DELIMITER, MEDIA_SUFFIX, UNKNOWN_DATE,
};
pub use notification::NotificationRecord;
pub use traits::NotificationLedger;
