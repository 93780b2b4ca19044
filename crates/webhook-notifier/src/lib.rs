//! Webhook Notification Sink
//!
//! Mirrors alerts into a chat channel through an incoming webhook:
//! - Post a new message per alert and return its id
//! - Edit the message in place when the alert changes
//! - Delete the message when the alert is retracted
//! - Client-side rate limiting to stay inside the webhook bucket

mod embed;
mod webhook;

pub use embed::{
    alert_color, alert_embed, relative_timestamp, Embed, EmbedAuthor, EmbedField, WebhookMessage,
};
pub use webhook::{parse_webhook_url, WebhookConfig, WebhookNotifier};

use async_trait::async_trait;
use nws_client::AlertRecord;
use thiserror::Error;

/// Identifier of a posted message
pub type MessageId = String;

/// Notifier error types
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The sink refused the request (rate limit, bad id, permissions)
    #[error("Webhook rejected request with {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The target message no longer exists
    #[error("Message not found")]
    NotFound,

    #[error("Invalid webhook response: {0}")]
    InvalidResponse(String),

    #[error("Invalid webhook configuration: {0}")]
    InvalidConfig(String),
}

impl NotifierError {
    /// Whether the sink asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, NotifierError::Rejected { status: 429, .. })
    }
}

/// Chat sink for alert messages
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a new message for `record`
    async fn post(&self, record: &AlertRecord) -> Result<MessageId, NotifierError>;

    /// Replace the content of `message_id` with `record`
    async fn update(
        &self,
        message_id: &str,
        record: &AlertRecord,
    ) -> Result<MessageId, NotifierError>;

    /// Delete `message_id`; [`NotifierError::NotFound`] if it is already gone
    async fn delete(&self, message_id: &str) -> Result<(), NotifierError>;
}
