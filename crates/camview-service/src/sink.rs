//! Outbound notification messages and the webhook that delivers them.

use std::time::Duration;

use async_trait::async_trait;
use camview_core::{derived_date, display_name, CoreError, CoreResult};
use camview_storage::ObjectMetadata;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::format::format_size;

/// Colour used for new-upload notifications.
pub const NEW_UPLOAD_COLOR: u32 = 0x00ff00;

const NEW_UPLOAD_TITLE: &str = "📹 New Video Uploaded";
const FOOTER_TEXT: &str = "Camera Viewer S3 Monitor";

/// One labelled value in a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationField {
    pub name: String,
    pub value: String,
    /// Rendered side by side with neighbouring inline fields.
    pub inline: bool,
}

impl NotificationField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }
}

/// Sink-agnostic structured notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub summary_text: String,
    pub title: String,
    pub color_hint: u32,
    pub fields: Vec<NotificationField>,
    pub timestamp: DateTime<Utc>,
    pub footer_text: String,
}

impl NotificationMessage {
    /// Announcement for a newly uploaded video in `bucket`.
    pub fn new_upload(bucket: &str, object: &ObjectMetadata) -> Self {
        Self {
            summary_text: format!("A new video has been uploaded to S3 bucket `{bucket}`"),
            title: NEW_UPLOAD_TITLE.to_string(),
            color_hint: NEW_UPLOAD_COLOR,
            fields: vec![
                NotificationField::new("📅 Date", derived_date(&object.key), true),
                NotificationField::new("📁 Filename", display_name(&object.key), true),
                NotificationField::new("📊 Size", format_size(object.size_bytes), true),
                NotificationField::new("🗂️ S3 Key", format!("`{}`", object.key), false),
            ],
            timestamp: object.last_modified,
            footer_text: FOOTER_TEXT.to_string(),
        }
    }
}

/// Destination for notification messages.
///
/// A send either succeeds or fails as a whole; no partial delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Delivers `message`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::SendFailed` when the destination does not accept it.
    async fn send(&self, message: &NotificationMessage) -> CoreResult<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    embeds: [Embed<'a>; 1],
}

#[derive(Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    fields: &'a [NotificationField],
    timestamp: String,
    footer: EmbedFooter<'a>,
}

#[derive(Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
}

impl<'a> WebhookPayload<'a> {
    fn from_message(message: &'a NotificationMessage) -> Self {
        Self {
            embeds: [Embed {
                title: &message.title,
                description: &message.summary_text,
                color: message.color_hint,
                fields: &message.fields,
                timestamp: message.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                footer: EmbedFooter {
                    text: &message.footer_text,
                },
            }],
        }
    }
}

/// Posts messages as a Discord-compatible `{"embeds": [...]}` JSON body.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    /// Creates a sink posting to `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Internal` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::internal(format!("failed to build webhook client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, message: &NotificationMessage) -> CoreResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload::from_message(message))
            .send()
            .await
            .map_err(|e| CoreError::SendFailed(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = %status, "Webhook accepted notification");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(CoreError::SendFailed(format!(
            "webhook returned status {status}: {body}"
        )))
    }
}
