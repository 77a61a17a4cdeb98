//! JSONL writer for aggregation reports - one JSON object per report cycle

use super::backend::{ReportRecord, ReportWriterBackend, ReportWriterError};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonlReportWriter {
    file: BufWriter<File>,
    path: PathBuf,
}

impl JsonlReportWriter {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ReportWriterError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        log::info!("📝 Writing aggregation reports to: {}", path.display());

        Ok(Self {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_record(&mut self, record: &ReportRecord) -> Result<(), ReportWriterError> {
        let json = serde_json::to_string(record)?;
        writeln!(self.file, "{}", json)?;
        Ok(())
    }
}

impl Drop for JsonlReportWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

#[async_trait]
impl ReportWriterBackend for JsonlReportWriter {
    async fn write_report(&mut self, record: &ReportRecord) -> Result<(), ReportWriterError> {
        self.write_record(record)
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        self.file.flush()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregationReport;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_appends_one_line_per_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports/aggregates.jsonl");
        let mut writer = JsonlReportWriter::new(&path).unwrap();

        let mut values = AggregationReport::new();
        values.insert("dht1/temperature".to_string(), 21.25);
        writer.write_report(&ReportRecord::now(values)).await.unwrap();
        writer.write_report(&ReportRecord::now(AggregationReport::new())).await.unwrap();
        writer.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: ReportRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.values["dht1/temperature"], 21.25);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second["values"].as_object().unwrap().is_empty());
        assert!(second["timestamp"].is_string());
    }
}
