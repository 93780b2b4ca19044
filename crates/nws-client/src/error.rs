//! NWS Client Error Types

use thiserror::Error;

/// Errors that can occur while fetching active alerts
#[derive(Debug, Error)]
pub enum NwsError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("NWS API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The payload did not match the expected GeoJSON shape or held an
    /// unrecognized enum value
    #[error("Malformed alert payload: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for NwsError {
    fn from(err: serde_json::Error) -> Self {
        NwsError::Malformed(err.to_string())
    }
}
