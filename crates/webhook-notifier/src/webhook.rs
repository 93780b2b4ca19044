//! Webhook Notifier
//!
//! Executes, edits and deletes webhook messages with client-side rate limiting.

use crate::embed::WebhookMessage;
use crate::{MessageId, Notifier, NotifierError};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nws_client::AlertRecord;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info, warn};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Longest error body kept in [`NotifierError::Rejected`]
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Webhook notifier configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Full webhook URL including id and token
    pub url: String,
    /// Requests allowed per `rate_window`
    pub rate_burst: u32,
    /// Window over which `rate_burst` requests replenish
    pub rate_window: Duration,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl WebhookConfig {
    /// Defaults matching the webhook bucket of 5 requests per 2 seconds
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rate_burst: 5,
            rate_window: Duration::from_secs(2),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
}

/// Chat webhook sink
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Url,
    limiter: DirectLimiter,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL carries the webhook token
        f.debug_struct("WebhookNotifier")
            .field("host", &self.url.host_str())
            .finish_non_exhaustive()
    }
}

impl WebhookNotifier {
    /// Create a notifier for the configured webhook
    pub fn new(config: &WebhookConfig) -> Result<Self, NotifierError> {
        let url = parse_webhook_url(&config.url)?;

        let burst = NonZeroU32::new(config.rate_burst)
            .ok_or_else(|| NotifierError::InvalidConfig("rate_burst must be > 0".to_string()))?;
        let period = config.rate_window / burst.get();
        let quota = Quota::with_period(period)
            .ok_or_else(|| NotifierError::InvalidConfig("rate_window must be > 0".to_string()))?
            .allow_burst(burst);

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        info!(
            "Webhook notifier ready for {} ({} requests / {:?})",
            url.host_str().unwrap_or("unknown host"),
            burst,
            config.rate_window
        );

        Ok(Self {
            http,
            url,
            limiter: RateLimiter::direct(quota),
        })
    }

    /// URL for a single message under this webhook
    pub fn message_url(&self, message_id: &str) -> Result<Url, NotifierError> {
        message_url(&self.url, message_id)
    }

    async fn send_message(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<MessageId, NotifierError> {
        self.limiter.until_ready().await;
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        check_status(status, &body)?;

        let message: MessageResponse = serde_json::from_str(&body)
            .map_err(|e| NotifierError::InvalidResponse(e.to_string()))?;
        Ok(message.id)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn post(&self, record: &AlertRecord) -> Result<MessageId, NotifierError> {
        let body = WebhookMessage::for_post(record);
        let request = self
            .http
            .post(self.url.clone())
            .query(&[("wait", "true")])
            .json(&body);

        let message_id = self.send_message(request).await?;
        debug!("Posted {} as message {}", record.id, message_id);
        Ok(message_id)
    }

    async fn update(
        &self,
        message_id: &str,
        record: &AlertRecord,
    ) -> Result<MessageId, NotifierError> {
        let body = WebhookMessage::for_edit(record);
        let request = self.http.patch(self.message_url(message_id)?).json(&body);

        let edited = self.send_message(request).await?;
        debug!("Edited message {} for {}", edited, record.id);
        Ok(edited)
    }

    async fn delete(&self, message_id: &str) -> Result<(), NotifierError> {
        let url = self.message_url(message_id)?;
        self.limiter.until_ready().await;
        let response = self.http.delete(url).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        check_status(status, &body)?;
        debug!("Deleted message {}", message_id);
        Ok(())
    }
}

/// Validate a webhook URL: absolute http(s) with a path
pub fn parse_webhook_url(raw: &str) -> Result<Url, NotifierError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| NotifierError::InvalidConfig(format!("invalid webhook URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(NotifierError::InvalidConfig(format!(
            "webhook URL must be http or https, got {}",
            url.scheme()
        )));
    }
    if url.cannot_be_a_base() {
        return Err(NotifierError::InvalidConfig(
            "webhook URL must have a path".to_string(),
        ));
    }
    Ok(url)
}

fn message_url(webhook: &Url, message_id: &str) -> Result<Url, NotifierError> {
    let mut url = webhook.clone();
    url.path_segments_mut()
        .map_err(|_| NotifierError::InvalidConfig("webhook URL must have a path".to_string()))?
        .pop_if_empty()
        .push("messages")
        .push(message_id);
    Ok(url)
}

/// Map a non-success response onto the error kinds the reconciler acts on
fn check_status(status: StatusCode, body: &str) -> Result<(), NotifierError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(NotifierError::NotFound);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Webhook rate limited: {}", body);
    }
    Err(NotifierError::Rejected {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}
