//! Active-Alert Query Parameters

use crate::alert::{Severity, Status, ZoneId};
use serde::{Deserialize, Serialize};

/// Filter description for one active-alerts request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertQuery {
    /// Zone to query
    pub zone: ZoneId,
    /// Severities to request (empty = no server-side filter)
    pub severities: Vec<Severity>,
    /// Statuses to request (empty = no server-side filter)
    pub statuses: Vec<Status>,
}

impl AlertQuery {
    /// Query for the severities and statuses worth mirroring
    pub fn for_zone(zone: impl Into<ZoneId>) -> Self {
        Self {
            zone: zone.into(),
            severities: vec![Severity::Moderate, Severity::Severe, Severity::Extreme],
            statuses: vec![Status::Actual],
        }
    }

    /// Query every alert for the zone, leaving all filtering to the caller
    pub fn unfiltered(zone: impl Into<ZoneId>) -> Self {
        Self {
            zone: zone.into(),
            severities: Vec::new(),
            statuses: Vec::new(),
        }
    }

    /// Render as URL query pairs for `/alerts/active`
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("zone", self.zone.clone())];

        if !self.severities.is_empty() {
            let severities: Vec<&str> = self.severities.iter().map(Severity::as_str).collect();
            pairs.push(("severity", severities.join(",")));
        }

        if !self.statuses.is_empty() {
            let statuses: Vec<String> = self
                .statuses
                .iter()
                .map(|s| s.as_str().to_lowercase())
                .collect();
            pairs.push(("status", statuses.join(",")));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_pairs() {
        let query = AlertQuery::for_zone("ILZ014");
        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("zone", "ILZ014".to_string()),
                ("severity", "Moderate,Severe,Extreme".to_string()),
                ("status", "actual".to_string()),
            ]
        );
    }

    #[test]
    fn test_unfiltered_pairs() {
        let query = AlertQuery::unfiltered("ILC031");
        assert_eq!(query.to_query_pairs(), vec![("zone", "ILC031".to_string())]);
    }
}
