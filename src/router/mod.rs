//! Time-Bucketed Log Router
//!
//! Appends every message to `<root>/<yyyy>/<mm>/<yyyy>_<mm>_<dd>/<topic>-<yyyy>-<mm>-<dd>.log`.
//!
//! # Timestamps
//!
//! The router keeps a monotonic "current timestamp" driven only by receive
//! times. Sender-supplied times are clamped into
//! `[current - max_drift, current + max_drift]` before bucketing; a clamped
//! record is preceded by a `# Extreme timestamp difference` comment line.
//!
//! # Stream cache
//!
//! One [`LogStream`] per `(encoded topic, local day)`, created on first use and
//! inserted before its file is open. `close_old_streams()` drops buckets whose
//! day no longer touches the drift window.

pub mod drift;
pub mod message;
pub mod stream;

pub use drift::DriftWindow;
pub use message::LogMessage;
pub use stream::{AppendWriter, FileOpener, LogStream, StreamOpener};

use crate::scheduler::{schedule_every, ScheduleError, ScheduledTask};
use crate::timefmt::{day_bounds, day_parts};
use chrono::{DateTime, Local, NaiveDate};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

const NOTIFY_CAPACITY: usize = 1024;

/// Configuration for the log router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Base directory for topic logs
    pub log_root: PathBuf,

    /// Accepted distance between a message timestamp and the receive clock
    pub max_drift: Duration,

    /// Period of the stale-stream sweep started by `start_auto_cleanup`
    pub cleanup_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("logs"),
            max_drift: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Notification sent after a record has been flushed to its file
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenLine {
    pub filename: PathBuf,
    pub topic: String,
    pub node_id: Option<String>,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamKey {
    pub topic: String,
    pub day: NaiveDate,
}

/// Map a topic to a filename-safe string.
///
/// Runs of `/` and `.` become a single `-`; anything outside
/// `[A-Za-z0-9_-]` is dropped.
pub fn encode_topic(topic: &str) -> String {
    let mut encoded = String::with_capacity(topic.len());
    let mut in_separator_run = false;

    for c in topic.chars() {
        if c == '/' || c == '.' {
            if !in_separator_run {
                encoded.push('-');
                in_separator_run = true;
            }
            continue;
        }
        in_separator_run = false;
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            encoded.push(c);
        }
    }

    encoded
}

/// Log path for an encoded topic on the local day of `ts`
pub fn log_filename(log_root: &Path, encoded_topic: &str, ts: &DateTime<Local>) -> PathBuf {
    let (y, m, d) = day_parts(ts);
    log_root
        .join(&y)
        .join(&m)
        .join(format!("{}_{}_{}", y, m, d))
        .join(format!("{}-{}-{}-{}.log", encoded_topic, y, m, d))
}

struct RouterState {
    window: DriftWindow,
    streams: HashMap<StreamKey, LogStream>,
    topic_owners: HashMap<String, String>,
    collisions: BTreeSet<(String, String)>,
}

impl RouterState {
    /// Remember which topic first produced `encoded`; warn once per
    /// distinct topic that lands on the same encoding.
    fn note_topic(&mut self, encoded: &str, topic: &str) {
        match self.topic_owners.get(encoded) {
            Some(owner) if owner != topic => {
                let pair = (topic.to_string(), owner.clone());
                if self.collisions.insert(pair) {
                    log::warn!(
                        "⚠️  Topic '{}' encodes to '{}', already used by '{}'; both will share one log file",
                        topic,
                        encoded,
                        owner
                    );
                }
            }
            Some(_) => {}
            None => {
                self.topic_owners.insert(encoded.to_string(), topic.to_string());
            }
        }
    }
}

/// Routes messages to per-topic, per-day append logs.
///
/// Cloning yields another handle to the same cache. Must be used from within
/// a Tokio runtime since new buckets spawn a writer task.
#[derive(Clone)]
pub struct LogRouter {
    config: Arc<RouterConfig>,
    opener: Arc<dyn StreamOpener>,
    state: Arc<Mutex<RouterState>>,
    lines: broadcast::Sender<WrittenLine>,
}

impl LogRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self::with_opener(config, Arc::new(FileOpener))
    }

    pub fn with_opener(config: RouterConfig, opener: Arc<dyn StreamOpener>) -> Self {
        let max_drift = chrono::Duration::from_std(config.max_drift)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let (lines, _) = broadcast::channel(NOTIFY_CAPACITY);

        Self {
            config: Arc::new(config),
            opener,
            state: Arc::new(Mutex::new(RouterState {
                window: DriftWindow::new(max_drift),
                streams: HashMap::new(),
                topic_owners: HashMap::new(),
                collisions: BTreeSet::new(),
            })),
            lines,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Stamp a message with the local clock and route it
    pub fn receive(
        &self,
        topic: impl Into<String>,
        text: impl Into<String>,
        explicit_time: Option<DateTime<Local>>,
    ) {
        let mut message = LogMessage::new(topic, text, Local::now());
        message.explicit_time = explicit_time;
        self.message(message);
    }

    /// Route one message. Delivery is best-effort: I/O failures are logged.
    pub fn message(&self, m: LogMessage) {
        let effective = m.explicit_time.unwrap_or(m.received_time);

        let mut guard = self.lock();
        let state = &mut *guard;

        // Receive time only; the sender's clock never moves the window
        state.window.advance(m.received_time);
        let (ts, clamped) = state.window.clamp(effective);

        let mut text = String::new();
        if clamped {
            log::debug!(
                "⏱️  Clamped timestamp for '{}' from {} to {}",
                m.topic,
                effective,
                ts
            );
            text.push_str(&message::clamp_notice(&m.received_time));
            text.push('\n');
        }
        let line = m.format_record(&ts);
        text.push_str(&line);
        text.push('\n');

        let encoded = encode_topic(&m.topic);
        state.note_topic(&encoded, &m.topic);
        let key = StreamKey {
            topic: encoded,
            day: ts.date_naive(),
        };

        let notice = |filename: &Path| WrittenLine {
            filename: filename.to_path_buf(),
            topic: m.topic.clone(),
            node_id: m.node_id.clone(),
            line: line.clone(),
        };

        let stream = self.resolve(&mut state.streams, &key, &ts);
        let filename = stream.filename().to_path_buf();
        if stream.write(text.clone(), notice(&filename)) {
            return;
        }

        // Writer died between the liveness check and the send; retry once
        // against a fresh stream.
        state.streams.remove(&key);
        let stream = self.resolve(&mut state.streams, &key, &ts);
        if !stream.write(text, notice(&filename)) {
            log::error!("❌ Dropped record for {}: stream unavailable", filename.display());
        }
    }

    /// Cached stream for `key`, replacing one whose writer has failed.
    fn resolve<'a>(
        &self,
        streams: &'a mut HashMap<StreamKey, LogStream>,
        key: &StreamKey,
        ts: &DateTime<Local>,
    ) -> &'a LogStream {
        if streams.get(key).map_or(false, |s| !s.is_alive()) {
            if let Some(dead) = streams.remove(key) {
                log::warn!("♻️  Reopening failed log stream {}", dead.filename().display());
            }
        }

        streams.entry(key.clone()).or_insert_with(|| {
            let filename = log_filename(&self.config.log_root, &key.topic, ts);
            let (min_ts, max_ts) = day_bounds(ts);
            log::debug!("📂 New log bucket {}", filename.display());
            LogStream::spawn(filename, min_ts, max_ts, self.opener.clone(), self.lines.clone())
        })
    }

    /// Sweep against the wall clock
    pub fn close_old_streams(&self) -> Vec<StreamKey> {
        self.close_old_streams_at(Local::now())
    }

    /// Advance the window to `now` and close every bucket whose day no
    /// longer overlaps it. Returns the evicted keys.
    pub fn close_old_streams_at(&self, now: DateTime<Local>) -> Vec<StreamKey> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.window.advance(now);

        let window = &state.window;
        let mut stale: Vec<StreamKey> = state
            .streams
            .iter()
            .filter(|(_, s)| !window.overlaps(s.min_ts(), s.max_ts()))
            .map(|(k, _)| k.clone())
            .collect();
        stale.sort();

        for key in &stale {
            if let Some(stream) = state.streams.remove(key) {
                log::info!("📕 Closing stale log stream {}", stream.filename().display());
                stream.close();
            }
        }

        stale
    }

    /// Run `close_old_streams` every `cleanup_interval`; drop or cancel the
    /// returned handle to stop.
    pub fn start_auto_cleanup(&self) -> Result<ScheduledTask, ScheduleError> {
        let router = self.clone();
        schedule_every("log-cleanup", self.config.cleanup_interval, move || {
            router.close_old_streams();
        })
    }

    /// Close every cached stream and wait until each file is closed.
    pub async fn shutdown(&self) -> usize {
        let pending: Vec<_> = {
            let mut state = self.lock();
            state
                .streams
                .drain()
                .map(|(_, stream)| stream.close_and_wait())
                .collect()
        };

        let count = pending.len();
        for done in pending {
            // Err means the writer had already exited
            let _ = done.await;
        }
        log::info!("✅ Closed {} log streams", count);
        count
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WrittenLine> {
        self.lines.subscribe()
    }

    /// Currently cached bucket keys, sorted
    pub fn open_streams(&self) -> Vec<StreamKey> {
        let mut keys: Vec<_> = self.lock().streams.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn stream_filename(&self, key: &StreamKey) -> Option<PathBuf> {
        self.lock().streams.get(key).map(|s| s.filename().to_path_buf())
    }

    pub fn current_window(&self) -> DriftWindow {
        self.lock().window.clone()
    }

    /// `(topic, earlier topic)` pairs that share an encoded name
    pub fn topic_collisions(&self) -> Vec<(String, String)> {
        self.lock().collisions.iter().cloned().collect()
    }
}
