//! GeoJSON Feed Decoding
//!
//! Maps the `/alerts/active` FeatureCollection onto [`AlertRecord`]s.

use crate::alert::{
    clean_description, wmo_office, AlertRecord, Lifecycle, MessageType, Severity, Status,
    Urgency, ZoneId,
};
use crate::error::NwsError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertProperties {
    id: String,
    #[serde(default)]
    area_desc: Option<String>,
    #[serde(default)]
    sent: Option<DateTime<Utc>>,
    #[serde(default)]
    effective: Option<DateTime<Utc>>,
    #[serde(default)]
    onset: Option<DateTime<Utc>>,
    #[serde(default)]
    expires: Option<DateTime<Utc>>,
    #[serde(default)]
    ends: Option<DateTime<Utc>>,
    status: Status,
    message_type: MessageType,
    severity: Severity,
    urgency: Urgency,
    event: String,
    #[serde(default)]
    sender_name: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    parameters: HashMap<String, Value>,
}

impl AlertProperties {
    fn parameter_strings(&self, key: &str) -> Vec<String> {
        match self.parameters.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    fn into_record(self, zone: &ZoneId, now: DateTime<Utc>) -> AlertRecord {
        let nws_headline = self.parameter_strings("NWSheadline");
        let wmo_office = self
            .parameter_strings("WMOidentifier")
            .first()
            .and_then(|id| wmo_office(id));

        let mut record = AlertRecord {
            lifecycle: Lifecycle::derive(self.message_type, self.expires, now),
            id: self.id,
            zones: BTreeSet::from([zone.clone()]),
            severity: self.severity,
            urgency: self.urgency,
            status: self.status,
            message_type: self.message_type,
            event: self.event,
            headline: self.headline,
            description: self.description.as_deref().map(clean_description),
            instruction: self.instruction,
            response: self.response,
            sender_name: self.sender_name,
            area_desc: self.area_desc,
            nws_headline,
            wmo_office,
            sent: self.sent,
            effective: self.effective,
            onset: self.onset,
            expires: self.expires,
            ends: self.ends,
            content_version: 0,
        };
        record.refresh_content_version();
        record
    }
}

/// Decode a FeatureCollection body fetched for `zone` as observed at `now`.
///
/// Any unrecognized severity, urgency, status or message type fails the whole
/// payload.
pub fn parse_alerts(
    body: &str,
    zone: &ZoneId,
    now: DateTime<Utc>,
) -> Result<Vec<AlertRecord>, NwsError> {
    let collection: FeatureCollection = serde_json::from_str(body)?;
    Ok(collection
        .features
        .into_iter()
        .map(|f| f.properties.into_record(zone, now))
        .collect())
}
