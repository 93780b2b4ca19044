//! api.weather.gov Client
//!
//! Async HTTP client for the active-alerts endpoint.

use crate::alert::AlertRecord;
use crate::error::NwsError;
use crate::feed::parse_alerts;
use crate::query::AlertQuery;
use crate::AlertSource;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Public API root
pub const DEFAULT_BASE_URL: &str = "https://api.weather.gov";

/// Default timeout for API requests
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest error body kept in [`NwsError::Status`]
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for the NWS active-alerts API
#[derive(Debug, Clone)]
pub struct NwsClient {
    http: reqwest::Client,
    base_url: String,
}

impl NwsClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root, normally [`DEFAULT_BASE_URL`]
    /// * `user_agent` - identifying User-Agent; the API rejects anonymous clients
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, NwsError> {
        Self::with_timeout(base_url, user_agent, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new client with a custom request timeout
    pub fn with_timeout(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, NwsError> {
        info!("Creating NWS client for {}", base_url);

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the active-alerts endpoint
    pub fn active_alerts_url(&self) -> String {
        format!("{}/alerts/active", self.base_url)
    }

    /// Fetch active alerts matching `query`
    pub async fn active_alerts(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, NwsError> {
        let url = self.active_alerts_url();
        debug!("GET {} zone={}", url, query.zone);

        let response = self
            .http
            .get(&url)
            .query(&query.to_query_pairs())
            .header(reqwest::header::ACCEPT, "application/geo+json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("NWS API {} for zone {}", status, query.zone);
            return Err(NwsError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let records = parse_alerts(&body, &query.zone, Utc::now())?;
        debug!("Zone {} returned {} alerts", query.zone, records.len());
        Ok(records)
    }
}

#[async_trait]
impl AlertSource for NwsClient {
    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, NwsError> {
        self.active_alerts(query).await
    }
}
