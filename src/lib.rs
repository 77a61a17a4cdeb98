//! # aggrolog
//!
//! Telemetry logger for an unordered stream of named sensor readings and
//! free-text device messages.
//!
//! ```text
//! feed (stdin / pub-sub client) → ingest::run_ingestion
//!     ├─ numeric values → PeriodicAggregator → AggregationReport → ReportWriter (JSONL | SQLite)
//!     └─ raw messages   → LogRouter → <root>/<yyyy>/<mm>/<yyyy>_<mm>_<dd>/<topic>-<yyyy>-<mm>-<dd>.log
//! ```
//!
//! The aggregator samples the latest value of every watched channel on a
//! fixed tick and reports per-channel means every `steps_per_report` ticks.
//! The router appends every message to a per-topic, per-day log file, clamping
//! untrusted timestamps into a drift window around the receive clock.

pub mod aggregator;
pub mod config;
pub mod csv_export;
pub mod ingest;
pub mod logreader;
pub mod report;
pub mod router;
pub mod scheduler;
pub mod simulator;
pub mod timefmt;

pub use aggregator::{AggregationReport, Aggregator, AggregatorError, AggregatorHandle, PeriodicAggregator};
pub use router::{LogMessage, LogRouter, RouterConfig, WrittenLine};
pub use scheduler::{schedule_every, ScheduleError, ScheduledTask};
