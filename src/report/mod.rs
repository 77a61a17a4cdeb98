//! Report output
//!
//! Persists each completed aggregation report, one record per cycle.
//! Two backends: JSONL (append-only file) and SQLite (one row per channel).

pub mod backend;
pub mod jsonl_writer;
pub mod sqlite_writer;
pub mod writer;

pub use backend::{ReportRecord, ReportWriterBackend, ReportWriterError};
pub use jsonl_writer::JsonlReportWriter;
pub use sqlite_writer::SqliteReportWriter;
pub use writer::{report_writer_task, ReportWriter};
