//! Severity Filter

use nws_client::{AlertRecord, Lifecycle, Severity, Status};

/// Whether an alert is worth mirroring.
///
/// In scope means moderate or worse, still active, and a real (`Actual`)
/// message rather than a test, exercise, system or draft message.
pub fn is_in_scope(record: &AlertRecord) -> bool {
    matches!(
        record.severity,
        Severity::Moderate | Severity::Severe | Severity::Extreme
    ) && record.lifecycle == Lifecycle::Active
        && record.status == Status::Actual
}
