//! Adaptive Poll Scheduler
//!
//! Drives reconciliation ticks with a two-state cadence: a quiet baseline
//! interval, and a short interval while an urgent alert is tracked.

mod scheduler;

pub use scheduler::{Cadence, PollScheduler, PollState, SchedulerConfig};
