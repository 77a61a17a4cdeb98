//! Reader for topic log files
//!
//! A log line is whitespace-separated tokens, optionally followed by
//! `# comment`. Tokens are either an ISO 8601 timestamp
//! (`YYYY-MM-DDTHH:MM:SS` plus `Z` or `±HH:MM`) or `key:value` pairs.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Trimmed source line
    pub text: String,
    pub values: BTreeMap<String, String>,
    pub comment: Option<String>,
}

/// Whole-token match for the timestamp shape the router writes
pub fn is_timestamp_token(token: &str) -> bool {
    let b = token.as_bytes();
    let digits = |range: std::ops::Range<usize>| b[range].iter().all(u8::is_ascii_digit);

    let base_ok = b.len() >= 20
        && digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && b[10] == b'T'
        && digits(11..13)
        && b[13] == b':'
        && digits(14..16)
        && b[16] == b':'
        && digits(17..19);
    if !base_ok {
        return false;
    }

    match &b[19..] {
        b"Z" => true,
        [sign, h1, h2, b':', m1, m2] => {
            (*sign == b'+' || *sign == b'-') && [h1, h2, m1, m2].iter().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Parse one line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    parse_line_at(line, "?", 0)
}

fn parse_line_at(line: &str, source: &str, line_number: usize) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (body, comment) = match line.split_once('#') {
        Some((body, comment)) => (body.trim(), Some(comment.trim().to_string())),
        None => (line, None),
    };

    let mut values = BTreeMap::new();
    for token in body.split_whitespace() {
        if is_timestamp_token(token) {
            values.insert("timestamp".to_string(), token.to_string());
        } else if let Some((key, value)) = token.split_once(':').filter(|(k, _)| !k.is_empty()) {
            values.insert(key.to_string(), value.to_string());
        } else {
            log::warn!("Unrecognized token '{}' at {}:{}", token, source, line_number);
        }
    }

    Some(LogRecord {
        text: line.to_string(),
        values,
        comment,
    })
}

/// Parse every line of `reader`, passing records to `on_record`.
pub fn read_lines<R, F>(reader: R, source: &str, on_record: &mut F) -> io::Result<usize>
where
    R: BufRead,
    F: FnMut(LogRecord),
{
    let mut count = 0;
    for (idx, line) in reader.lines().enumerate() {
        if let Some(record) = parse_line_at(&line?, source, idx + 1) {
            on_record(record);
            count += 1;
        }
    }
    Ok(count)
}

/// Read a file, or every file below a directory in sorted name order.
pub fn read_path<F>(path: &Path, on_record: &mut F) -> io::Result<usize>
where
    F: FnMut(LogRecord),
{
    if path.is_dir() {
        let mut entries = std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();

        let mut count = 0;
        for entry in entries {
            count += read_path(&entry, on_record)?;
        }
        Ok(count)
    } else {
        let file = File::open(path)?;
        read_lines(BufReader::new(file), &path.display().to_string(), on_record)
    }
}
