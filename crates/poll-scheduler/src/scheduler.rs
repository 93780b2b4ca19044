//! Poll Scheduler Implementation

use alerting::{AlertRegistry, TrackedAlert};
use chrono::{DateTime, Utc};
use metrics::gauge;
use nws_client::{AlertSource, Urgency, ZoneId};
use rand::Rng;
use reconciler::Reconciler;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};
use webhook_notifier::Notifier;

/// Configuration for the poll scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval while nothing urgent is tracked (default: 5 minutes)
    pub baseline_interval: Duration,
    /// Interval while an urgent alert is tracked (default: 1 minute)
    pub urgent_interval: Duration,
    /// Maximum random reduction of the baseline sleep
    pub baseline_jitter: Duration,
    /// Maximum random reduction of the urgent sleep
    pub urgent_jitter: Duration,
    /// How soon an `Expected` alert must start to count as urgent
    pub near_term: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            baseline_interval: Duration::from_secs(300),
            urgent_interval: Duration::from_secs(60),
            baseline_jitter: Duration::from_secs(15),
            urgent_jitter: Duration::from_secs(10),
            near_term: Duration::from_secs(30 * 60),
        }
    }
}

/// Polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cadence {
    #[default]
    Baseline,
    Urgent,
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Baseline => f.write_str("baseline"),
            Cadence::Urgent => f.write_str("urgent"),
        }
    }
}

/// Process-wide polling state, owned by the run loop
#[derive(Debug, Default)]
pub struct PollState {
    /// Posted alerts
    pub registry: AlertRegistry,
    /// Ticks completed so far
    pub ticks: u64,
    pub cadence: Cadence,
    /// Interval chosen after the last tick, before jitter
    pub interval: Duration,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Poll scheduler for the reconciliation loop
pub struct PollScheduler {
    config: SchedulerConfig,
}

impl PollScheduler {
    /// Create a new poll scheduler
    pub fn new(config: SchedulerConfig) -> Self {
        info!(
            "Poll scheduler created: baseline {:?}, urgent {:?}",
            config.baseline_interval, config.urgent_interval
        );
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether a tracked alert calls for fast polling at `now`
    pub fn is_urgent(&self, tracked: &TrackedAlert, now: DateTime<Utc>) -> bool {
        match tracked.urgency {
            Urgency::Immediate => true,
            Urgency::Expected => {
                let window = chrono::Duration::from_std(self.config.near_term)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                tracked
                    .starts_at()
                    .map_or(false, |starts| starts <= now + window)
            }
            _ => false,
        }
    }

    /// Cadence implied by the most urgent tracked alert
    pub fn cadence(&self, registry: &AlertRegistry, now: DateTime<Utc>) -> Cadence {
        if registry.iter().any(|t| self.is_urgent(t, now)) {
            Cadence::Urgent
        } else {
            Cadence::Baseline
        }
    }

    pub fn interval_for(&self, cadence: Cadence) -> Duration {
        match cadence {
            Cadence::Baseline => self.config.baseline_interval,
            Cadence::Urgent => self.config.urgent_interval,
        }
    }

    /// Interval before the next tick, without jitter
    pub fn next_interval(&self, registry: &AlertRegistry, now: DateTime<Utc>) -> Duration {
        self.interval_for(self.cadence(registry, now))
    }

    /// Shorten the cadence interval by a random amount up to its jitter
    pub fn jittered(&self, cadence: Cadence) -> Duration {
        let interval = self.interval_for(cadence);
        let jitter = match cadence {
            Cadence::Baseline => self.config.baseline_jitter,
            Cadence::Urgent => self.config.urgent_jitter,
        }
        .min(interval);

        if jitter.is_zero() {
            return interval;
        }
        interval - rand::thread_rng().gen_range(Duration::ZERO..=jitter)
    }

    /// Recompute cadence and interval from the registry, logging transitions
    pub fn update_state(&self, state: &mut PollState, now: DateTime<Utc>) {
        let cadence = self.cadence(&state.registry, now);
        if cadence != state.cadence {
            info!("Cadence {} -> {}", state.cadence, cadence);
        }
        state.cadence = cadence;
        state.interval = self.interval_for(cadence);
    }

    /// Run ticks until `shutdown` becomes true.
    ///
    /// The first tick runs immediately. A tick always runs to completion;
    /// shutdown is only observed between ticks.
    pub async fn run<S: AlertSource, N: Notifier>(
        &self,
        reconciler: &Reconciler<S, N>,
        state: &mut PollState,
        zones: &[ZoneId],
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Starting poll scheduler for {} zones", zones.len());

        while !*shutdown.borrow() {
            state.ticks += 1;
            reconciler
                .tick(&mut state.registry, state.ticks, zones)
                .await;

            self.update_state(state, Utc::now());
            let sleep = self.jittered(state.cadence);
            gauge!("alert_bot_poll_interval_seconds").set(sleep.as_secs_f64());
            debug!("Sleep timer: {:?} ({} cadence)", sleep, state.cadence);

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        info!("Poll scheduler stopped after {} ticks", state.ticks);
    }
}
