//! NWS Active-Alert Client
//!
//! This crate fetches active alerts from api.weather.gov and normalizes them
//! into [`AlertRecord`]s with closed severity/urgency/status enums, a derived
//! lifecycle marker and a content version for change detection.

mod alert;
mod client;
mod error;
mod feed;
mod query;

pub use alert::{
    clean_description, wmo_office, AlertRecord, Lifecycle, MessageType, Severity, Status,
    Urgency, ZoneId,
};
pub use client::{NwsClient, DEFAULT_BASE_URL};
pub use error::NwsError;
pub use feed::parse_alerts;
pub use query::AlertQuery;

use async_trait::async_trait;

/// Source of active alert records, one zone per call
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Fetch the alerts currently active for `query.zone`
    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, NwsError>;
}
