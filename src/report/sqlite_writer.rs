//! SQLite writer for aggregation reports
//!
//! One row per channel per report in `aggregation_reports`.

use super::backend::{ReportRecord, ReportWriterBackend, ReportWriterError};
use crate::timefmt::format_iso8601;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;

pub struct SqliteReportWriter {
    conn: Connection,
    batch: Vec<ReportRecord>,
    batch_size: usize,
}

impl SqliteReportWriter {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, ReportWriterError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ReportWriterError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create database directory {}: {}", parent.display(), e),
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS aggregation_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_time TEXT NOT NULL,
                report_unix INTEGER NOT NULL,
                channel TEXT NOT NULL,
                mean REAL NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_channel_time ON aggregation_reports(channel, report_unix DESC)",
            [],
        )?;

        log::info!("✅ SQLite report writer initialized");

        Ok(Self {
            conn,
            batch: Vec::with_capacity(16),
            batch_size: 16,
        })
    }

    fn flush_batch(&mut self) -> Result<(), ReportWriterError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        let mut rows = 0;

        for record in &self.batch {
            let report_time = format_iso8601(&record.timestamp);
            for (channel, mean) in &record.values {
                tx.execute(
                    "INSERT INTO aggregation_reports (report_time, report_unix, channel, mean)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![report_time, record.timestamp.timestamp(), channel, mean],
                )?;
                rows += 1;
            }
        }

        tx.commit()?;

        log::debug!("✅ Flushed {} reports ({} rows) to SQLite", self.batch.len(), rows);
        self.batch.clear();

        Ok(())
    }
}

#[async_trait]
impl ReportWriterBackend for SqliteReportWriter {
    async fn write_report(&mut self, record: &ReportRecord) -> Result<(), ReportWriterError> {
        self.batch.push(record.clone());

        if self.batch.len() >= self.batch_size {
            self.flush_batch()?;
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        self.flush_batch()
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
