//! Alerting System
//!
//! Provides the severity filter that decides which alerts are mirrored and the
//! registry mapping each mirrored alert to its posted message.

mod filter;
mod registry;

pub use filter::is_in_scope;
pub use registry::{AlertRegistry, MessageId, RegistryError, TrackedAlert};
