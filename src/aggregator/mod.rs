//! Periodic Aggregator - fixed-tick sampler with rolling-average reports
//!
//! # Lifecycle
//!
//! ```text
//! set_value(key, v) ──► current value per channel
//!                             │ every step_interval (tick)
//!                             ▼
//!                       snapshot → history (one entry per tick, None = missing)
//!                             │ every steps_per_report ticks
//!                             ▼
//!                       report() → callback(AggregationReport) → reset
//! ```
//!
//! [`Aggregator`] is the synchronous core and can be stepped by hand.
//! [`PeriodicAggregator`] drives it from a [`crate::scheduler::ScheduledTask`].

pub mod channel;
pub mod engine;
pub mod periodic;

pub use channel::Channel;
pub use engine::Aggregator;
pub use periodic::{AggregatorHandle, PeriodicAggregator};

use crate::scheduler::ScheduleError;
use std::collections::BTreeMap;
use std::time::Duration;

/// Channel name → mean of its non-missing samples over one report cycle
pub type AggregationReport = BTreeMap<String, f64>;

/// Receives every completed report. Must not call back into the aggregator.
pub type ReportCallback = Box<dyn FnMut(AggregationReport) + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorError {
    AlreadyStarted,
    DuplicateKey(String),
    InvalidConfig(String),
}

impl std::fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregatorError::AlreadyStarted => write!(f, "Aggregator already started"),
            AggregatorError::DuplicateKey(key) => write!(f, "Duplicate watch key: {}", key),
            AggregatorError::InvalidConfig(msg) => write!(f, "Invalid aggregator configuration: {}", msg),
        }
    }
}

impl std::error::Error for AggregatorError {}

impl From<ScheduleError> for AggregatorError {
    fn from(err: ScheduleError) -> Self {
        AggregatorError::InvalidConfig(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Channel names, in report order
    pub watch_keys: Vec<String>,

    /// Tick period
    pub step_interval: Duration,

    /// Ticks per report cycle
    pub steps_per_report: u64,
}
