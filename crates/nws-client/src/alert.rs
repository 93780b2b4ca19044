//! NWS Alert Records and Classification Enums
//!
//! Defines the closed severity/urgency/status enumerations used by the feed and
//! the normalized [`AlertRecord`] produced for each active alert.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// NWS forecast or county zone identifier (e.g. "ILZ014", "ILC031")
pub type ZoneId = String;

/// CAP severity of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Severity not known
    Unknown,
    /// Minimal to no known threat
    Minor,
    /// Possible threat to life or property
    Moderate,
    /// Significant threat to life or property
    Severe,
    /// Extraordinary threat to life or property
    Extreme,
}

impl Severity {
    /// Name as used by the feed
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "Unknown",
            Severity::Minor => "Minor",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
            Severity::Extreme => "Extreme",
        }
    }
}

/// CAP urgency of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Urgency {
    /// Urgency not known
    Unknown,
    /// Responsive action no longer required
    Past,
    /// Responsive action should be taken in the near future
    Future,
    /// Responsive action should be taken soon (within the next hour)
    Expected,
    /// Responsive action should be taken immediately
    Immediate,
}

impl Urgency {
    /// Name as used by the feed
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Unknown => "Unknown",
            Urgency::Past => "Past",
            Urgency::Future => "Future",
            Urgency::Expected => "Expected",
            Urgency::Immediate => "Immediate",
        }
    }
}

/// CAP message status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Actionable by all targeted recipients
    Actual,
    /// Actionable only by designated exercise participants
    Exercise,
    /// For messages that support alert network internal functions
    System,
    /// Technical testing only
    Test,
    /// Preliminary template or draft
    Draft,
}

impl Status {
    /// Name as used by the feed
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Actual => "Actual",
            Status::Exercise => "Exercise",
            Status::System => "System",
            Status::Test => "Test",
            Status::Draft => "Draft",
        }
    }
}

/// CAP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Alert,
    Update,
    Cancel,
    Ack,
    Error,
}

/// Lifecycle marker derived from the message type and expiry time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// In effect
    Active,
    /// Explicitly canceled by the issuing office
    Canceled,
    /// Past its expiry time
    Expired,
}

impl Lifecycle {
    /// Derive the lifecycle as observed at `now`
    pub fn derive(
        message_type: MessageType,
        expires: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        if message_type == MessageType::Cancel {
            return Lifecycle::Canceled;
        }
        match expires {
            Some(expires) if expires < now => Lifecycle::Expired,
            _ => Lifecycle::Active,
        }
    }
}

macro_rules! impl_display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(Severity, Urgency, Status);

/// One alert from the active-alerts feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Stable feed identity, reused across updates to the same event
    pub id: String,
    /// Zones whose fetch returned this alert
    pub zones: BTreeSet<ZoneId>,
    pub severity: Severity,
    pub urgency: Urgency,
    pub status: Status,
    pub message_type: MessageType,
    pub lifecycle: Lifecycle,
    /// Event name (e.g. "Tornado Warning")
    pub event: String,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    /// Recommended response type (e.g. "Shelter", "Execute")
    pub response: Option<String>,
    /// Issuing office display name (e.g. "NWS Chicago IL")
    pub sender_name: Option<String>,
    pub area_desc: Option<String>,
    /// Short NWS headline lines from the alert parameters
    pub nws_headline: Vec<String>,
    /// Three-letter issuing office code from the WMO identifier
    pub wmo_office: Option<String>,
    pub sent: Option<DateTime<Utc>>,
    pub effective: Option<DateTime<Utc>>,
    pub onset: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
    pub ends: Option<DateTime<Utc>>,
    /// Hash of the mutable fields, see [`AlertRecord::compute_content_version`]
    pub content_version: u64,
}

impl AlertRecord {
    /// Hash every field an in-place update can change.
    ///
    /// Zone membership is left out: a zone fetch failing for one tick must not
    /// look like an edit to the alert.
    pub fn compute_content_version(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.severity.hash(&mut hasher);
        self.urgency.hash(&mut hasher);
        self.status.hash(&mut hasher);
        self.message_type.hash(&mut hasher);
        self.event.hash(&mut hasher);
        self.headline.hash(&mut hasher);
        self.description.hash(&mut hasher);
        self.instruction.hash(&mut hasher);
        self.response.hash(&mut hasher);
        self.nws_headline.hash(&mut hasher);
        self.sent.hash(&mut hasher);
        self.effective.hash(&mut hasher);
        self.onset.hash(&mut hasher);
        self.expires.hash(&mut hasher);
        self.ends.hash(&mut hasher);
        hasher.finish()
    }

    /// Recompute and store the content version
    pub fn refresh_content_version(&mut self) {
        self.content_version = self.compute_content_version();
    }

    /// Fold another observation of the same alert into this one
    pub fn merge_zones(&mut self, other: &AlertRecord) {
        self.zones.extend(other.zones.iter().cloned());
    }

    /// Time the hazard begins, falling back to the effective time
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.onset.or(self.effective)
    }

    /// Link to the public alert page
    pub fn web_url(&self) -> String {
        format!("https://alerts.weather.gov/search?id={}", self.id)
    }
}

/// Column padding in product text: four or more whitespace characters
static PADDING_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{4,}").unwrap_or_else(|_| unreachable!()));

/// Collapse the feed's column padding into ", "
pub fn clean_description(text: &str) -> String {
    PADDING_REGEX.replace_all(text, ", ").trim().to_string()
}

/// Extract the issuing office from a WMO identifier such as "WUUS53 KLOT 011200"
pub fn wmo_office(identifier: &str) -> Option<String> {
    let station = identifier.split_whitespace().nth(1)?;
    let chars: Vec<char> = station.chars().collect();
    if chars.len() < 3 {
        return None;
    }
    Some(chars[chars.len() - 3..].iter().collect())
}
