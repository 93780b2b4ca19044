//! Alert Registry
//!
//! Authoritative record of which alerts currently have a posted message.

use chrono::{DateTime, Utc};
use nws_client::{AlertRecord, Severity, Urgency};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

/// Identifier of a posted chat message
pub type MessageId = String;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A message id may belong to only one tracked alert
    #[error("message {message_id} already tracks alert {owner}")]
    DuplicateMessage { message_id: MessageId, owner: String },
}

/// A posted alert and the message that represents it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAlert {
    pub alert_id: String,
    pub message_id: MessageId,
    /// Content version of the record last posted or edited
    pub last_content_version: u64,
    /// Tick on which the alert was last observed in scope
    pub last_seen_tick: u64,
    /// Event name, kept for log lines
    pub event: String,
    pub severity: Severity,
    pub urgency: Urgency,
    pub effective: Option<DateTime<Utc>>,
    pub onset: Option<DateTime<Utc>>,
}

impl TrackedAlert {
    /// Build an entry for `record` as posted under `message_id`
    pub fn from_record(record: &AlertRecord, message_id: MessageId, tick: u64) -> Self {
        Self {
            alert_id: record.id.clone(),
            message_id,
            last_content_version: record.content_version,
            last_seen_tick: tick,
            event: record.event.clone(),
            severity: record.severity,
            urgency: record.urgency,
            effective: record.effective,
            onset: record.onset,
        }
    }

    /// Time the hazard begins, falling back to the effective time
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.onset.or(self.effective)
    }
}

/// Mapping from alert id to its posted message
#[derive(Debug, Default, Clone)]
pub struct AlertRegistry {
    entries: BTreeMap<String, TrackedAlert>,
    by_message: HashMap<MessageId, String>,
}

impl AlertRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, alert_id: &str) -> Option<&TrackedAlert> {
        self.entries.get(alert_id)
    }

    /// Insert or replace the entry for `tracked.alert_id`.
    ///
    /// Returns the previous entry for the same alert, if any.
    pub fn upsert(&mut self, tracked: TrackedAlert) -> Result<Option<TrackedAlert>, RegistryError> {
        if let Some(owner) = self.by_message.get(&tracked.message_id) {
            if owner != &tracked.alert_id {
                return Err(RegistryError::DuplicateMessage {
                    message_id: tracked.message_id.clone(),
                    owner: owner.clone(),
                });
            }
        }

        let previous = self.entries.insert(tracked.alert_id.clone(), tracked.clone());
        if let Some(prev) = &previous {
            if prev.message_id != tracked.message_id {
                self.by_message.remove(&prev.message_id);
            }
        }
        self.by_message
            .insert(tracked.message_id.clone(), tracked.alert_id.clone());

        debug!(
            "Tracking {} ({}) as message {}",
            tracked.alert_id, tracked.event, tracked.message_id
        );
        Ok(previous)
    }

    /// Stop tracking an alert
    pub fn remove(&mut self, alert_id: &str) -> Option<TrackedAlert> {
        let removed = self.entries.remove(alert_id)?;
        self.by_message.remove(&removed.message_id);
        debug!("Untracked {} (message {})", alert_id, removed.message_id);
        Some(removed)
    }

    /// Ids of every tracked alert
    pub fn all_ids(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Alert id that owns `message_id`
    pub fn find_by_message(&self, message_id: &str) -> Option<&TrackedAlert> {
        self.by_message
            .get(message_id)
            .and_then(|alert_id| self.entries.get(alert_id))
    }

    /// Record that a tracked alert was observed on `tick`
    pub fn mark_seen(&mut self, alert_id: &str, tick: u64) {
        if let Some(entry) = self.entries.get_mut(alert_id) {
            entry.last_seen_tick = tick;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedAlert> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
