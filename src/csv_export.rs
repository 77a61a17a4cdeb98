//! Log-to-CSV conversion
//!
//! Projects the `key:value` pairs of log records onto a fixed column list,
//! written through a `csv::Writer` with RFC 4180 quoting.

use crate::logreader::{read_path, LogRecord};
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Write};
use std::path::Path;

/// Records need at least this many non-empty cells to be written: 2 when
/// `timestamp` is a column (a bare timestamp is noise), otherwise 1.
pub fn default_min_record_size(columns: &[String]) -> usize {
    if columns.iter().any(|c| c == "timestamp") {
        2
    } else {
        1
    }
}

pub struct LogToCsv<W: Write> {
    out: Writer<W>,
    columns: Vec<String>,
    titles: HashMap<String, String>,
    pub min_record_size: usize,
    key_memory: Option<BTreeSet<String>>,
}

impl<W: Write> LogToCsv<W> {
    pub fn new(out: W, columns: Vec<String>) -> Self {
        let out = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(out);

        Self {
            out,
            columns,
            titles: HashMap::new(),
            min_record_size: 1,
            key_memory: None,
        }
    }

    pub fn with_titles(mut self, titles: HashMap<String, String>) -> Self {
        self.titles = titles;
        self
    }

    /// Track every key seen so callers can list the available columns
    pub fn remember_keys(&mut self) {
        self.key_memory.get_or_insert_with(BTreeSet::new);
    }

    pub fn seen_keys(&self) -> Vec<String> {
        self.key_memory
            .as_ref()
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn write_headers(&mut self) -> csv::Result<()> {
        let titles: Vec<&str> = self
            .columns
            .iter()
            .map(|c| self.titles.get(c).unwrap_or(c).as_str())
            .collect();
        self.out.write_record(&titles)
    }

    /// Write one row; returns `false` when the record was too sparse.
    pub fn write_record(&mut self, values: &BTreeMap<String, String>) -> csv::Result<bool> {
        if let Some(keys) = &mut self.key_memory {
            keys.extend(values.keys().cloned());
        }

        let cells: Vec<&str> = self
            .columns
            .iter()
            .map(|c| values.get(c).map(String::as_str).unwrap_or(""))
            .collect();
        let filled = cells.iter().filter(|c| !c.is_empty()).count();

        if filled < self.min_record_size {
            return Ok(false);
        }

        self.out.write_record(&cells)?;
        Ok(true)
    }

    /// Convert a log file or a whole log tree. Returns rows written.
    pub fn process_path(&mut self, path: &Path) -> csv::Result<usize> {
        let mut rows = 0;
        let mut failure = None;

        read_path(path, &mut |record: LogRecord| {
            if failure.is_some() {
                return;
            }
            match self.write_record(&record.values) {
                Ok(true) => rows += 1,
                Ok(false) => {}
                Err(e) => failure = Some(e),
            }
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(rows),
        }
    }

    pub fn flush(&mut self) -> csv::Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> csv::Result<W> {
        self.out.into_inner().map_err(|e| {
            let cause = e.error();
            csv::Error::from(io::Error::new(cause.kind(), cause.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn output(csv: LogToCsv<Vec<u8>>) -> String {
        String::from_utf8(csv.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_cells_use_rfc4180_quoting() {
        let mut csv = LogToCsv::new(Vec::new(), cols(&["a", "b", "c"]));

        csv.write_record(&values(&[
            ("a", "plain"),
            ("b", "say \"hi\", bob"),
            ("c", "line1\nline2"),
        ]))
        .unwrap();

        assert_eq!(output(csv), "plain,\"say \"\"hi\"\", bob\",\"line1\nline2\"\n");
    }

    #[test]
    fn test_quoted_cells_read_back() {
        let mut csv = LogToCsv::new(Vec::new(), cols(&["note", "temp"]));
        csv.write_record(&values(&[("note", "a, \"b\"\nc"), ("temp", "20")]))
            .unwrap();
        let text = output(csv);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "a, \"b\"\nc");
        assert_eq!(&row[1], "20");
    }

    #[test]
    fn test_default_min_record_size() {
        assert_eq!(default_min_record_size(&cols(&["temp"])), 1);
        assert_eq!(default_min_record_size(&cols(&["timestamp", "temp"])), 2);
    }

    #[test]
    fn test_headers_use_titles() {
        let mut titles = HashMap::new();
        titles.insert("temp".to_string(), "Temperature (C)".to_string());
        let mut csv = LogToCsv::new(Vec::new(), cols(&["timestamp", "temp"])).with_titles(titles);

        csv.write_headers().unwrap();
        assert_eq!(output(csv), "timestamp,Temperature (C)\n");
    }

    #[test]
    fn test_sparse_records_skipped() {
        let columns = cols(&["timestamp", "temp"]);
        let mut csv = LogToCsv::new(Vec::new(), columns.clone());
        csv.min_record_size = default_min_record_size(&columns);

        assert!(!csv.write_record(&values(&[("timestamp", "T1")])).unwrap());
        assert!(csv.write_record(&values(&[("timestamp", "T2"), ("temp", "20")])).unwrap());
        assert!(!csv.write_record(&values(&[("other", "x")])).unwrap());

        assert_eq!(output(csv), "T2,20\n");
    }

    #[test]
    fn test_key_memory_and_process_path() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("dev-2020-06-15.log"),
            "2020-06-15T12:00:00+00:00 temp:20 rh:40\n# note\n2020-06-15T12:01:00+00:00 temp:21\n",
        )
        .unwrap();

        let mut csv = LogToCsv::new(Vec::new(), cols(&["temp"]));
        csv.remember_keys();
        let rows = csv.process_path(dir.path()).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(csv.seen_keys(), cols(&["rh", "temp", "timestamp"]));
        assert_eq!(output(csv), "20\n21\n");
    }
}
