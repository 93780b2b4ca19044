//! Reconciler Implementation

use crate::action::{Action, ActionKind, ActionOutcome};
use crate::SyncError;
use alerting::{is_in_scope, AlertRegistry, TrackedAlert};
use futures::future::join_all;
use metrics::{counter, gauge};
use nws_client::{AlertQuery, AlertRecord, AlertSource, ZoneId};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};
use webhook_notifier::{Notifier, NotifierError};

/// Summary of one tick
#[derive(Debug, Default)]
pub struct TickReport {
    /// Tick number
    pub tick: u64,
    /// Distinct alerts returned across all zones
    pub fetched: usize,
    /// Alerts that passed the severity filter
    pub in_scope: usize,
    /// Zones whose fetch failed
    pub source_errors: Vec<SyncError>,
    /// Every attempted action, in application order
    pub outcomes: Vec<ActionOutcome>,
}

impl TickReport {
    fn count(&self, kind: ActionKind) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.kind == kind && o.succeeded())
            .count()
    }

    pub fn posted(&self) -> usize {
        self.count(ActionKind::Post)
    }

    pub fn updated(&self) -> usize {
        self.count(ActionKind::Update)
    }

    pub fn retracted(&self) -> usize {
        self.count(ActionKind::Retract)
    }

    /// Actions that failed and will be regenerated next tick
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }

    /// Whether anything was attempted against the sink
    pub fn is_quiet(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Diff the in-scope subset of `records` against the registry.
///
/// Posts come first in chronological order (onset, then sent), then updates,
/// then retractions, so new information surfaces before stale messages go.
pub fn plan(registry: &AlertRegistry, records: &[AlertRecord]) -> Vec<Action> {
    let in_scope: BTreeMap<&str, &AlertRecord> = records
        .iter()
        .filter(|r| is_in_scope(r))
        .map(|r| (r.id.as_str(), r))
        .collect();

    let mut posts: Vec<&AlertRecord> = Vec::new();
    let mut updates = Vec::new();

    for (id, record) in &in_scope {
        match registry.get(id) {
            None => posts.push(*record),
            Some(tracked) if tracked.last_content_version != record.content_version => {
                updates.push(Action::Update(id.to_string(), (*record).clone()));
            }
            Some(_) => {}
        }
    }

    posts.sort_by(|a, b| (a.onset, a.sent, &a.id).cmp(&(b.onset, b.sent, &b.id)));

    let retracts = registry
        .all_ids()
        .into_iter()
        .filter(|id| !in_scope.contains_key(id.as_str()))
        .map(Action::Retract);

    posts
        .into_iter()
        .map(|r| Action::Post(r.clone()))
        .chain(updates)
        .chain(retracts)
        .collect()
}

/// Drives one alert source and one notifier
pub struct Reconciler<S, N> {
    source: S,
    notifier: N,
}

impl<S: AlertSource, N: Notifier> Reconciler<S, N> {
    /// Create a new reconciler
    pub fn new(source: S, notifier: N) -> Self {
        Self { source, notifier }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Fetch every zone concurrently and merge the results by alert id.
    ///
    /// A failing zone is reported and contributes nothing; the rest proceed.
    pub async fn collect(&self, zones: &[ZoneId]) -> (Vec<AlertRecord>, Vec<SyncError>) {
        let fetches = zones.iter().map(|zone| async move {
            let query = AlertQuery::for_zone(zone.clone());
            (zone, self.source.fetch(&query).await)
        });
        let results = join_all(fetches).await;

        let mut merged: BTreeMap<String, AlertRecord> = BTreeMap::new();
        let mut errors = Vec::new();

        for (zone, result) in results {
            match result {
                Ok(records) => {
                    for record in records {
                        match merged.get_mut(&record.id) {
                            Some(existing) => existing.merge_zones(&record),
                            None => {
                                merged.insert(record.id.clone(), record);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("Fetch failed for zone {}: {}", zone, e);
                    counter!("alert_bot_source_errors_total", "zone" => zone.clone()).increment(1);
                    errors.push(SyncError::SourceUnavailable {
                        zone: zone.clone(),
                        source: e,
                    });
                }
            }
        }

        (merged.into_values().collect(), errors)
    }

    /// Run one full tick against `registry`
    pub async fn tick(
        &self,
        registry: &mut AlertRegistry,
        tick: u64,
        zones: &[ZoneId],
    ) -> TickReport {
        let (records, source_errors) = self.collect(zones).await;
        let actions = plan(registry, &records);

        for record in records.iter().filter(|r| is_in_scope(r)) {
            let unchanged = registry
                .get(&record.id)
                .map_or(false, |t| t.last_content_version == record.content_version);
            if unchanged {
                registry.mark_seen(&record.id, tick);
            }
        }

        let in_scope = records.iter().filter(|r| is_in_scope(r)).count();
        debug!(
            "Tick {}: {} fetched, {} in scope, {} actions",
            tick,
            records.len(),
            in_scope,
            actions.len()
        );

        let outcomes = self.apply(registry, tick, actions).await;

        counter!("alert_bot_ticks_total").increment(1);
        gauge!("alert_bot_tracked_alerts").set(registry.len() as f64);

        let report = TickReport {
            tick,
            fetched: records.len(),
            in_scope,
            source_errors,
            outcomes,
        };

        if !report.is_quiet() {
            info!(
                "Tick {}: posted {}, updated {}, retracted {}, failed {}",
                tick,
                report.posted(),
                report.updated(),
                report.retracted(),
                report.failed()
            );
        }
        report
    }

    /// Apply actions in order; each one is attempted independently and the
    /// registry only changes for actions that succeeded.
    pub async fn apply(
        &self,
        registry: &mut AlertRegistry,
        tick: u64,
        actions: Vec<Action>,
    ) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(actions.len());

        for action in actions {
            let kind = action.kind();
            let alert_id = action.alert_id().to_string();

            let result = match action {
                Action::Post(record) => self.apply_post(registry, tick, &record).await,
                Action::Update(alert_id, record) => {
                    self.apply_update(registry, tick, &alert_id, &record).await
                }
                Action::Retract(alert_id) => self.apply_retract(registry, &alert_id).await,
            };

            let outcome = if result.is_ok() { "ok" } else { "error" };
            counter!(
                "alert_bot_actions_total",
                "kind" => kind.as_str(),
                "outcome" => outcome
            )
            .increment(1);

            if let Err(e) = &result {
                error!("{} failed for {}: {}", kind, alert_id, e);
            }

            outcomes.push(ActionOutcome {
                kind,
                alert_id,
                result,
            });
        }

        outcomes
    }

    async fn apply_post(
        &self,
        registry: &mut AlertRegistry,
        tick: u64,
        record: &AlertRecord,
    ) -> Result<Option<String>, SyncError> {
        let message_id = self
            .notifier
            .post(record)
            .await
            .map_err(|source| SyncError::SinkRejected {
                alert_id: record.id.clone(),
                action: ActionKind::Post,
                source,
            })?;

        registry
            .upsert(TrackedAlert::from_record(record, message_id.clone(), tick))
            .map_err(|source| SyncError::Registry {
                alert_id: record.id.clone(),
                source,
            })?;

        info!("Posted: {} ({})", record.id, record.event);
        Ok(Some(message_id))
    }

    async fn apply_update(
        &self,
        registry: &mut AlertRegistry,
        tick: u64,
        alert_id: &str,
        record: &AlertRecord,
    ) -> Result<Option<String>, SyncError> {
        let message_id = registry
            .get(alert_id)
            .map(|tracked| tracked.message_id.clone())
            .ok_or_else(|| SyncError::NotTracked(alert_id.to_string()))?;

        let edited = self
            .notifier
            .update(&message_id, record)
            .await
            .map_err(|source| SyncError::SinkRejected {
                alert_id: alert_id.to_string(),
                action: ActionKind::Update,
                source,
            })?;

        registry
            .upsert(TrackedAlert::from_record(record, edited.clone(), tick))
            .map_err(|source| SyncError::Registry {
                alert_id: alert_id.to_string(),
                source,
            })?;

        info!("Updated: {} ({})", alert_id, record.event);
        Ok(Some(edited))
    }

    async fn apply_retract(
        &self,
        registry: &mut AlertRegistry,
        alert_id: &str,
    ) -> Result<Option<String>, SyncError> {
        let message_id = registry
            .get(alert_id)
            .map(|tracked| tracked.message_id.clone())
            .ok_or_else(|| SyncError::NotTracked(alert_id.to_string()))?;

        match self.notifier.delete(&message_id).await {
            Ok(()) => {}
            Err(NotifierError::NotFound) => {
                warn!(
                    "Message {} for {} was already gone when retracting",
                    message_id, alert_id
                );
            }
            Err(source) => {
                return Err(SyncError::SinkRejected {
                    alert_id: alert_id.to_string(),
                    action: ActionKind::Retract,
                    source,
                });
            }
        }

        registry.remove(alert_id);
        info!("Deleted: {}", alert_id);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use nws_client::{Lifecycle, MessageType, NwsError, Severity, Status, Urgency};
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    fn record(id: &str, zone: &str, severity: Severity, urgency: Urgency) -> AlertRecord {
        let mut record = AlertRecord {
            id: id.to_string(),
            zones: BTreeSet::from([zone.to_string()]),
            severity,
            urgency,
            status: Status::Actual,
            message_type: MessageType::Alert,
            lifecycle: Lifecycle::Active,
            event: "Tornado Warning".to_string(),
            headline: Some(format!("{} headline", id)),
            description: None,
            instruction: None,
            response: None,
            sender_name: None,
            area_desc: None,
            nws_headline: Vec::new(),
            wmo_office: None,
            sent: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            effective: None,
            onset: None,
            expires: None,
            ends: None,
            content_version: 0,
        };
        record.refresh_content_version();
        record
    }

    /// Source returning canned alerts per zone; a zone mapped to `None` fails
    #[derive(Default)]
    struct MockSource {
        zones: Mutex<HashMap<ZoneId, Option<Vec<AlertRecord>>>>,
    }

    impl MockSource {
        fn set(&self, zone: &str, records: Vec<AlertRecord>) {
            self.zones
                .lock()
                .unwrap()
                .insert(zone.to_string(), Some(records));
        }

        fn fail(&self, zone: &str) {
            self.zones.lock().unwrap().insert(zone.to_string(), None);
        }
    }

    #[async_trait]
    impl AlertSource for MockSource {
        async fn fetch(&self, query: &AlertQuery) -> Result<Vec<AlertRecord>, NwsError> {
            match self.zones.lock().unwrap().get(&query.zone) {
                Some(Some(records)) => Ok(records.clone()),
                Some(None) => Err(NwsError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Post(String),
        Update(String, String),
        Delete(String),
    }

    #[derive(Default)]
    struct MockNotifier {
        next_id: AtomicU64,
        calls: Mutex<Vec<Call>>,
        failing_alerts: Mutex<HashSet<String>>,
        failing_deletes: Mutex<HashSet<String>>,
        missing_messages: Mutex<HashSet<String>>,
    }

    impl MockNotifier {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn rejected() -> NotifierError {
            NotifierError::Rejected {
                status: 500,
                body: "boom".to_string(),
            }
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn post(&self, record: &AlertRecord) -> Result<String, NotifierError> {
            self.calls.lock().unwrap().push(Call::Post(record.id.clone()));
            if self.failing_alerts.lock().unwrap().contains(&record.id) {
                return Err(Self::rejected());
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 100;
            Ok(id.to_string())
        }

        async fn update(
            &self,
            message_id: &str,
            record: &AlertRecord,
        ) -> Result<String, NotifierError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Update(message_id.to_string(), record.id.clone()));
            if self.failing_alerts.lock().unwrap().contains(&record.id) {
                return Err(Self::rejected());
            }
            Ok(message_id.to_string())
        }

        async fn delete(&self, message_id: &str) -> Result<(), NotifierError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Delete(message_id.to_string()));
            if self.failing_deletes.lock().unwrap().contains(message_id) {
                return Err(Self::rejected());
            }
            if self.missing_messages.lock().unwrap().contains(message_id) {
                return Err(NotifierError::NotFound);
            }
            Ok(())
        }
    }

    fn zones(ids: &[&str]) -> Vec<ZoneId> {
        ids.iter().map(|z| z.to_string()).collect()
    }

    fn reconciler() -> Reconciler<MockSource, MockNotifier> {
        Reconciler::new(MockSource::default(), MockNotifier::default())
    }

    #[tokio::test]
    async fn test_scenarios_post_idle_retract() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        // New severe immediate alert
        r.source()
            .set("ILZ014", vec![record("X1", "ILZ014", Severity::Severe, Urgency::Immediate)]);
        let report = r.tick(&mut registry, 1, &z).await;
        assert_eq!(report.posted(), 1);
        assert_eq!(r.notifier().calls(), vec![Call::Post("X1".to_string())]);
        assert_eq!(registry.get("X1").unwrap().message_id, "100");

        // Same alert unchanged
        r.notifier().clear_calls();
        let before: Vec<_> = registry
            .iter()
            .map(|t| (t.alert_id.clone(), t.message_id.clone(), t.last_content_version))
            .collect();
        let report = r.tick(&mut registry, 2, &z).await;
        assert!(report.is_quiet());
        assert!(r.notifier().calls().is_empty());
        let after: Vec<_> = registry
            .iter()
            .map(|t| (t.alert_id.clone(), t.message_id.clone(), t.last_content_version))
            .collect();
        assert_eq!(before, after);
        assert_eq!(registry.get("X1").unwrap().last_seen_tick, 2);

        // Feed no longer returns it
        r.source().set("ILZ014", Vec::new());
        let report = r.tick(&mut registry, 3, &z).await;
        assert_eq!(report.retracted(), 1);
        assert_eq!(r.notifier().calls(), vec![Call::Delete("100".to_string())]);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_minor_alert_produces_nothing() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();

        r.source()
            .set("ILZ014", vec![record("X2", "ILZ014", Severity::Minor, Urgency::Immediate)]);
        let report = r.tick(&mut registry, 1, &zones(&["ILZ014"])).await;

        assert_eq!(report.fetched, 1);
        assert_eq!(report.in_scope, 0);
        assert!(report.is_quiet());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_post_retried_next_tick() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        r.source()
            .set("ILZ014", vec![record("X3", "ILZ014", Severity::Severe, Urgency::Expected)]);
        r.notifier()
            .failing_alerts
            .lock()
            .unwrap()
            .insert("X3".to_string());

        let report = r.tick(&mut registry, 1, &z).await;
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            report.outcomes[0].result,
            Err(SyncError::SinkRejected {
                action: ActionKind::Post,
                ..
            })
        ));
        assert!(registry.get("X3").is_none());

        r.notifier().failing_alerts.lock().unwrap().clear();
        r.notifier().clear_calls();
        let report = r.tick(&mut registry, 2, &z).await;
        assert_eq!(report.posted(), 1);
        assert_eq!(r.notifier().calls(), vec![Call::Post("X3".to_string())]);
        assert!(registry.get("X3").is_some());
    }

    #[tokio::test]
    async fn test_changed_content_updates_in_place() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        let original = record("X1", "ILZ014", Severity::Severe, Urgency::Expected);
        r.source().set("ILZ014", vec![original.clone()]);
        r.tick(&mut registry, 1, &z).await;

        let mut edited = original.clone();
        edited.headline = Some("Extended until 9PM".to_string());
        edited.refresh_content_version();
        r.source().set("ILZ014", vec![edited.clone()]);
        r.notifier().clear_calls();

        let report = r.tick(&mut registry, 2, &z).await;
        assert_eq!(report.updated(), 1);
        assert_eq!(
            r.notifier().calls(),
            vec![Call::Update("100".to_string(), "X1".to_string())]
        );
        let tracked = registry.get("X1").unwrap();
        assert_eq!(tracked.last_content_version, edited.content_version);
        assert_eq!(tracked.message_id, "100");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_old_version() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        let original = record("X1", "ILZ014", Severity::Severe, Urgency::Expected);
        r.source().set("ILZ014", vec![original.clone()]);
        r.tick(&mut registry, 1, &z).await;

        let mut edited = original.clone();
        edited.urgency = Urgency::Immediate;
        edited.refresh_content_version();
        r.source().set("ILZ014", vec![edited]);
        r.notifier()
            .failing_alerts
            .lock()
            .unwrap()
            .insert("X1".to_string());

        let report = r.tick(&mut registry, 2, &z).await;
        assert_eq!(report.failed(), 1);
        assert_eq!(
            registry.get("X1").unwrap().last_content_version,
            original.content_version
        );
    }

    #[tokio::test]
    async fn test_canceled_and_expired_are_retracted() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        let a = record("A", "ILZ014", Severity::Severe, Urgency::Expected);
        let b = record("B", "ILZ014", Severity::Extreme, Urgency::Expected);
        r.source().set("ILZ014", vec![a.clone(), b.clone()]);
        r.tick(&mut registry, 1, &z).await;
        assert_eq!(registry.len(), 2);

        let mut canceled = a.clone();
        canceled.message_type = MessageType::Cancel;
        canceled.lifecycle = Lifecycle::Canceled;
        let mut expired = b.clone();
        expired.lifecycle = Lifecycle::Expired;
        r.source().set("ILZ014", vec![canceled, expired]);

        let report = r.tick(&mut registry, 2, &z).await;
        assert_eq!(report.retracted(), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_alert_in_many_zones_posted_once() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014", "ILC031", "ILZ013"]);

        for zone in &z {
            r.source()
                .set(zone, vec![record("X1", zone, Severity::Severe, Urgency::Expected)]);
        }

        let (records, errors) = r.collect(&z).await;
        assert!(errors.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].zones.len(), 3);

        let report = r.tick(&mut registry, 1, &z).await;
        assert_eq!(report.posted(), 1);
        assert_eq!(r.notifier().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_zone_failure_is_fail_open() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014", "ILZ013"]);

        r.source().fail("ILZ014");
        r.source()
            .set("ILZ013", vec![record("X1", "ILZ013", Severity::Severe, Urgency::Expected)]);

        let report = r.tick(&mut registry, 1, &z).await;
        assert_eq!(report.source_errors.len(), 1);
        assert!(matches!(
            &report.source_errors[0],
            SyncError::SourceUnavailable { zone, .. } if zone == "ILZ014"
        ));
        assert_eq!(report.posted(), 1);
    }

    #[tokio::test]
    async fn test_delete_not_found_counts_as_retracted() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        r.source()
            .set("ILZ014", vec![record("X1", "ILZ014", Severity::Severe, Urgency::Expected)]);
        r.tick(&mut registry, 1, &z).await;
        r.notifier()
            .missing_messages
            .lock()
            .unwrap()
            .insert("100".to_string());

        r.source().set("ILZ014", Vec::new());
        let report = r.tick(&mut registry, 2, &z).await;
        assert_eq!(report.retracted(), 1);
        assert_eq!(report.failed(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_entry() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        r.source()
            .set("ILZ014", vec![record("X1", "ILZ014", Severity::Severe, Urgency::Expected)]);
        r.tick(&mut registry, 1, &z).await;
        r.notifier()
            .failing_deletes
            .lock()
            .unwrap()
            .insert("100".to_string());

        r.source().set("ILZ014", Vec::new());
        let report = r.tick(&mut registry, 2, &z).await;
        assert_eq!(report.failed(), 1);
        assert!(registry.get("X1").is_some());

        r.notifier().failing_deletes.lock().unwrap().clear();
        let report = r.tick(&mut registry, 3, &z).await;
        assert_eq!(report.retracted(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let r = reconciler();
        let mut registry = AlertRegistry::new();
        let z = zones(&["ILZ014"]);

        r.source().set(
            "ILZ014",
            vec![
                record("A", "ILZ014", Severity::Severe, Urgency::Expected),
                record("B", "ILZ014", Severity::Severe, Urgency::Expected),
            ],
        );
        r.notifier()
            .failing_alerts
            .lock()
            .unwrap()
            .insert("A".to_string());

        let report = r.tick(&mut registry, 1, &z).await;
        assert_eq!(report.failed(), 1);
        assert_eq!(report.posted(), 1);
        assert!(registry.get("B").is_some());
        assert!(registry.get("A").is_none());
    }

    #[test]
    fn test_plan_orders_post_update_retract() {
        let mut registry = AlertRegistry::new();
        let stale = record("OLD", "ILZ014", Severity::Severe, Urgency::Expected);
        let changed = record("CHG", "ILZ014", Severity::Severe, Urgency::Expected);
        registry
            .upsert(TrackedAlert::from_record(&stale, "1".to_string(), 1))
            .unwrap();
        registry
            .upsert(TrackedAlert::from_record(&changed, "2".to_string(), 1))
            .unwrap();

        let mut changed_now = changed.clone();
        changed_now.description = Some("new text".to_string());
        changed_now.refresh_content_version();

        let mut late = record("LATE", "ILZ014", Severity::Severe, Urgency::Expected);
        late.onset = Some(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap());
        let mut early = record("EARLY", "ILZ014", Severity::Severe, Urgency::Expected);
        early.onset = Some(Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap());

        let actions = plan(&registry, &[late, changed_now, early]);
        let summary: Vec<_> = actions
            .iter()
            .map(|a| (a.kind(), a.alert_id().to_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ActionKind::Post, "EARLY".to_string()),
                (ActionKind::Post, "LATE".to_string()),
                (ActionKind::Update, "CHG".to_string()),
                (ActionKind::Retract, "OLD".to_string()),
            ]
        );
    }

    #[test]
    fn test_zone_spread_waits_for_next_content_change() {
        let mut registry = AlertRegistry::new();
        let posted = record("X1", "ILZ014", Severity::Severe, Urgency::Expected);
        registry
            .upsert(TrackedAlert::from_record(&posted, "1".to_string(), 1))
            .unwrap();

        let mut spread = posted.clone();
        spread.zones.insert("ILZ013".to_string());
        spread.refresh_content_version();
        assert!(plan(&registry, &[spread.clone()]).is_empty());

        spread.description = Some("extended".to_string());
        spread.refresh_content_version();
        match plan(&registry, &[spread]).as_slice() {
            [Action::Update(id, record)] => {
                assert_eq!(id, "X1");
                assert!(record.zones.contains("ILZ013"));
            }
            other => panic!("unexpected actions: {:?}", other),
        }
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Minor),
            Just(Severity::Moderate),
            Just(Severity::Severe),
            Just(Severity::Extreme),
        ]
    }

    fn feed_strategy() -> impl Strategy<Value = Vec<(u8, u8, Severity)>> {
        prop::collection::vec((0u8..8, 0u8..3, severity_strategy()), 0..16)
    }

    const ZONES: [&str; 3] = ["ILZ014", "ILC031", "ILZ013"];

    fn load_feed(source: &MockSource, feed: &[(u8, u8, Severity)]) {
        let mut by_zone: HashMap<&str, Vec<AlertRecord>> = HashMap::new();
        for &(id, zone, severity) in feed {
            let zone = ZONES[zone as usize];
            // one severity per id so every zone reports the same alert content
            let severity = feed
                .iter()
                .find(|(other, _, _)| *other == id)
                .map(|(_, _, s)| *s)
                .unwrap_or(severity);
            by_zone
                .entry(zone)
                .or_default()
                .push(record(&format!("A{}", id), zone, severity, Urgency::Expected));
        }
        for zone in ZONES {
            source.set(zone, by_zone.remove(zone).unwrap_or_default());
        }
    }

    fn run<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_second_identical_tick_is_quiet(feed in feed_strategy()) {
            let r = reconciler();
            let mut registry = AlertRegistry::new();
            let z = zones(&ZONES);
            load_feed(r.source(), &feed);

            let second = run(async {
                r.tick(&mut registry, 1, &z).await;
                r.tick(&mut registry, 2, &z).await
            });
            prop_assert!(second.is_quiet());
        }

        #[test]
        fn prop_one_post_per_new_in_scope_id(feed in feed_strategy()) {
            let r = reconciler();
            let mut registry = AlertRegistry::new();
            let z = zones(&ZONES);
            load_feed(r.source(), &feed);

            let (records, _) = run(r.collect(&z));
            let expected: BTreeSet<String> = records
                .iter()
                .filter(|rec| is_in_scope(rec))
                .map(|rec| rec.id.clone())
                .collect();

            let actions = plan(&registry, &records);
            let posted: Vec<String> = actions
                .iter()
                .filter(|a| a.kind() == ActionKind::Post)
                .map(|a| a.alert_id().to_string())
                .collect();
            let unique: BTreeSet<String> = posted.iter().cloned().collect();
            prop_assert_eq!(posted.len(), unique.len());
            prop_assert_eq!(unique, expected.clone());

            run(r.apply(&mut registry, 1, actions));
            prop_assert_eq!(registry.all_ids(), expected);
        }

        #[test]
        fn prop_every_stale_entry_retracted(feed in feed_strategy(), next in feed_strategy()) {
            let r = reconciler();
            let mut registry = AlertRegistry::new();
            let z = zones(&ZONES);

            load_feed(r.source(), &feed);
            run(r.tick(&mut registry, 1, &z));
            let tracked_before = registry.all_ids();

            load_feed(r.source(), &next);
            let (records, _) = run(r.collect(&z));
            let still_in_scope: BTreeSet<String> = records
                .iter()
                .filter(|rec| is_in_scope(rec))
                .map(|rec| rec.id.clone())
                .collect();

            let report = run(r.tick(&mut registry, 2, &z));
            let retracted: BTreeSet<String> = report
                .outcomes
                .iter()
                .filter(|o| o.kind == ActionKind::Retract)
                .map(|o| o.alert_id.clone())
                .collect();
            let expected: BTreeSet<String> =
                tracked_before.difference(&still_in_scope).cloned().collect();

            prop_assert_eq!(&retracted, &expected);
            for id in &expected {
                prop_assert!(registry.get(id).is_none());
            }
        }
    }
}
