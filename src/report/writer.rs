//! Unified writer interface for aggregation reports
//!
//! Routes writes to either JSONL or SQLite backend based on configuration.

use super::backend::{ReportRecord, ReportWriterBackend, ReportWriterError};
use super::jsonl_writer::JsonlReportWriter;
use super::sqlite_writer::SqliteReportWriter;
use crate::config::BackendType;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

/// Unified writer that routes to either JSONL or SQLite backend
pub enum ReportWriter {
    Jsonl(JsonlReportWriter),
    Sqlite(SqliteReportWriter),
}

impl ReportWriter {
    pub fn new(backend: BackendType, path: impl AsRef<Path>) -> Result<Self, ReportWriterError> {
        match backend {
            BackendType::Jsonl => Ok(ReportWriter::Jsonl(JsonlReportWriter::new(path)?)),
            BackendType::Sqlite => Ok(ReportWriter::Sqlite(SqliteReportWriter::new(path)?)),
        }
    }
}

#[async_trait]
impl ReportWriterBackend for ReportWriter {
    async fn write_report(&mut self, record: &ReportRecord) -> Result<(), ReportWriterError> {
        match self {
            ReportWriter::Jsonl(w) => w.write_report(record).await,
            ReportWriter::Sqlite(w) => w.write_report(record).await,
        }
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        match self {
            ReportWriter::Jsonl(w) => w.flush().await,
            ReportWriter::Sqlite(w) => w.flush().await,
        }
    }

    fn backend_type(&self) -> &'static str {
        match self {
            ReportWriter::Jsonl(_) => "JSONL",
            ReportWriter::Sqlite(_) => "SQLite",
        }
    }
}

/// Drain reports into `writer` until every sender is dropped.
///
/// Each report is flushed as it arrives; write errors are logged and the
/// task keeps going. Returns the number of reports written.
pub async fn report_writer_task<W>(mut rx: mpsc::UnboundedReceiver<ReportRecord>, mut writer: W) -> u64
where
    W: ReportWriterBackend,
{
    log::info!("📊 Report writer started ({})", writer.backend_type());
    let mut written = 0u64;

    while let Some(record) = rx.recv().await {
        if let Err(e) = writer.write_report(&record).await {
            log::error!("❌ Failed to write report: {}", e);
            continue;
        }
        if let Err(e) = writer.flush().await {
            log::error!("❌ Failed to flush report: {}", e);
            continue;
        }
        written += 1;
        log::debug!("✅ Wrote report with {} channels", record.values.len());
    }

    if let Err(e) = writer.flush().await {
        log::error!("❌ Final report flush failed: {}", e);
    }
    log::info!("📊 Report writer stopped after {} reports", written);
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregationReport;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_writer_routes_by_backend() {
        let dir = tempdir().unwrap();
        let jsonl = ReportWriter::new(BackendType::Jsonl, dir.path().join("r.jsonl")).unwrap();
        let sqlite = ReportWriter::new(BackendType::Sqlite, dir.path().join("r.db")).unwrap();

        assert_eq!(jsonl.backend_type(), "JSONL");
        assert_eq!(sqlite.backend_type(), "SQLite");
    }

    #[tokio::test]
    async fn test_task_drains_until_senders_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/reports.jsonl");
        let writer = ReportWriter::new(BackendType::Jsonl, &path).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(report_writer_task(rx, writer));

        for mean in [1.0, 2.0, 3.0] {
            let mut values = AggregationReport::new();
            values.insert("t1".to_string(), mean);
            tx.send(ReportRecord::now(values)).unwrap();
        }
        drop(tx);

        assert_eq!(task.await.unwrap(), 3);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().last().unwrap().contains("\"t1\":3.0"));
    }
}
