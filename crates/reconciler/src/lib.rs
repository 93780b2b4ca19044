//! Alert Reconciliation
//!
//! One tick of the mirror: fetch every zone concurrently, keep the in-scope
//! alerts, diff them against the registry of posted messages and apply the
//! resulting posts, edits and deletions.

mod action;
mod reconciler;

pub use action::{Action, ActionKind, ActionOutcome};
pub use reconciler::{plan, Reconciler, TickReport};

use alerting::RegistryError;
use nws_client::{NwsError, ZoneId};
use thiserror::Error;
use webhook_notifier::NotifierError;

/// Errors raised during a tick. None of them are fatal.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetch for one zone failed; that zone contributes nothing this tick
    #[error("Alert source unavailable for zone {zone}: {source}")]
    SourceUnavailable {
        zone: ZoneId,
        #[source]
        source: NwsError,
    },

    /// The sink refused an action; it is retried on the next tick
    #[error("Sink rejected {action} for {alert_id}: {source}")]
    SinkRejected {
        alert_id: String,
        action: ActionKind,
        #[source]
        source: NotifierError,
    },

    /// Registry refused the result of a successful action
    #[error("Registry rejected {alert_id}: {source}")]
    Registry {
        alert_id: String,
        #[source]
        source: RegistryError,
    },

    /// An update was planned for an alert the registry no longer tracks
    #[error("Alert {0} is not tracked")]
    NotTracked(String),
}
