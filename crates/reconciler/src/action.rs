//! Reconciliation Actions

use crate::SyncError;
use nws_client::AlertRecord;
use std::fmt;

/// A change to apply to the chat channel
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// New in-scope alert: post a message
    Post(AlertRecord),
    /// Tracked alert whose content changed: edit its message
    Update(String, AlertRecord),
    /// Tracked alert no longer in scope: delete its message
    Retract(String),
}

impl Action {
    /// Alert the action concerns
    pub fn alert_id(&self) -> &str {
        match self {
            Action::Post(record) => &record.id,
            Action::Update(alert_id, _) | Action::Retract(alert_id) => alert_id,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Post(_) => ActionKind::Post,
            Action::Update(..) => ActionKind::Update,
            Action::Retract(_) => ActionKind::Retract,
        }
    }
}

/// Action discriminant, ordered as actions are applied within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    Post,
    Update,
    Retract,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Post => "post",
            ActionKind::Update => "update",
            ActionKind::Retract => "retract",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of attempting one action
#[derive(Debug)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    pub alert_id: String,
    /// `Ok` with the message id now tracked (none after a retract)
    pub result: Result<Option<String>, SyncError>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}
