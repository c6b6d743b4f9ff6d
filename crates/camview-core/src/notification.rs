use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A key that has already triggered an outbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Object key that was announced.
    pub key: String,
    /// When the notification was recorded.
    pub posted_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Whether the record falls outside `retention` as of `now`.
    pub fn is_expired(&self, retention: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.posted_at < now - retention
    }
}
