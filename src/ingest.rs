//! Feed ingestion - async channel processor for feed events
//!
//! The transport (stdin, a pub/sub client, a test) pushes [`FeedEvent`]s into
//! an mpsc channel; [`run_ingestion`] fans them out to the aggregator and the
//! log router until every sender is dropped.

use crate::aggregator::AggregatorHandle;
use crate::config::WatchTopic;
use crate::router::{LogMessage, LogRouter};
use crate::timefmt::parse_iso8601;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A reading for an aggregator channel
    Value { name: String, value: f64 },

    /// A raw device message for the log router
    Message {
        topic: String,
        payload: String,
        timestamp_hint: Option<DateTime<Local>>,
    },
}

/// Where ingested events go
#[derive(Clone, Default)]
pub struct IngestTargets {
    pub aggregator: Option<AggregatorHandle>,
    pub router: Option<LogRouter>,
    /// topic -> aggregator variable
    pub topic_variables: HashMap<String, String>,
}

impl IngestTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aggregator(mut self, handle: AggregatorHandle) -> Self {
        self.aggregator = Some(handle);
        self
    }

    pub fn with_router(mut self, router: LogRouter) -> Self {
        self.router = Some(router);
        self
    }

    pub fn watch(mut self, topic: impl Into<String>, variable: impl Into<String>) -> Self {
        self.topic_variables.insert(topic.into(), variable.into());
        self
    }

    pub fn watch_all(self, watched: &[WatchTopic]) -> Self {
        watched
            .iter()
            .fold(self, |targets, w| targets.watch(w.topic.clone(), w.variable.clone()))
    }

    fn apply_value(&self, name: &str, value: f64) -> bool {
        match &self.aggregator {
            Some(aggregator) => aggregator.set_value(name, value),
            None => false,
        }
    }
}

/// Counters returned when the feed closes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub values_applied: u64,
    pub values_ignored: u64,
    pub messages_routed: u64,
}

/// Split a feed line into `<topic> <payload...>`.
///
/// A leading RFC 3339 token in the payload is taken as the sender's
/// timestamp. The token stays in the payload, since records carrying an
/// explicit time are written verbatim. Blank lines yield `None`.
pub fn parse_feed_line(line: &str) -> Option<FeedEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (topic, rest) = match line.split_once(char::is_whitespace) {
        Some((topic, rest)) => (topic, rest.trim_start()),
        None => (line, ""),
    };

    let first = rest.split(char::is_whitespace).next().unwrap_or("");
    let timestamp_hint = parse_iso8601(first).map(|ts| ts.with_timezone(&Local));

    Some(FeedEvent::Message {
        topic: topic.to_string(),
        payload: rest.to_string(),
        timestamp_hint,
    })
}

/// Payload with the leading timestamp token removed when one was recognised
fn payload_body(payload: &str, has_timestamp: bool) -> &str {
    if !has_timestamp {
        return payload.trim();
    }
    match payload.trim_start().split_once(char::is_whitespace) {
        Some((_, tail)) => tail.trim(),
        None => "",
    }
}

/// Process feed events until the channel closes.
pub async fn run_ingestion(mut rx: mpsc::Receiver<FeedEvent>, targets: IngestTargets) -> IngestStats {
    log::info!("🚀 Starting feed ingestion");
    log::info!(
        "   ├─ Aggregator: {}",
        if targets.aggregator.is_some() { "enabled" } else { "disabled" }
    );
    log::info!(
        "   ├─ Log router: {}",
        if targets.router.is_some() { "enabled" } else { "disabled" }
    );
    log::info!("   └─ Watched topics: {}", targets.topic_variables.len());

    let mut stats = IngestStats::default();

    while let Some(event) = rx.recv().await {
        match event {
            FeedEvent::Value { name, value } => {
                if targets.apply_value(&name, value) {
                    stats.values_applied += 1;
                } else {
                    log::debug!("Ignoring value for unwatched channel '{}'", name);
                    stats.values_ignored += 1;
                }
            }
            FeedEvent::Message {
                topic,
                payload,
                timestamp_hint,
            } => {
                if let Some(variable) = targets.topic_variables.get(&topic) {
                    match payload_body(&payload, timestamp_hint.is_some()).parse::<f64>() {
                        Ok(value) if targets.apply_value(variable, value) => stats.values_applied += 1,
                        _ => {
                            log::debug!("Non-numeric payload on watched topic '{}'", topic);
                            stats.values_ignored += 1;
                        }
                    }
                }

                if let Some(router) = &targets.router {
                    let mut message = LogMessage::new(topic, payload, Local::now());
                    message.explicit_time = timestamp_hint;
                    router.message(message);
                    stats.messages_routed += 1;
                }
            }
        }
    }

    log::info!(
        "🛑 Feed closed: {} values applied, {} ignored, {} messages routed",
        stats.values_applied,
        stats.values_ignored,
        stats.messages_routed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregatorConfig, PeriodicAggregator};
    use crate::router::RouterConfig;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_parse_feed_line() {
        assert_eq!(parse_feed_line("   "), None);

        assert_eq!(
            parse_feed_line("dev/temp 21.5"),
            Some(FeedEvent::Message {
                topic: "dev/temp".to_string(),
                payload: "21.5".to_string(),
                timestamp_hint: None,
            })
        );

        assert_eq!(
            parse_feed_line("dev/status"),
            Some(FeedEvent::Message {
                topic: "dev/status".to_string(),
                payload: String::new(),
                timestamp_hint: None,
            })
        );
    }

    #[test]
    fn test_parse_feed_line_timestamp_hint() {
        let event = parse_feed_line("dev/temp 2020-06-15T12:00:00+00:00  a:1 b:2").unwrap();
        let expected = chrono::Utc.with_ymd_and_hms(2020, 6, 15, 12, 0, 0).unwrap();

        match event {
            FeedEvent::Message {
                topic,
                payload,
                timestamp_hint,
            } => {
                assert_eq!(topic, "dev/temp");
                assert_eq!(payload, "2020-06-15T12:00:00+00:00  a:1 b:2");
                assert_eq!(timestamp_hint.unwrap(), expected);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_payload_body_skips_timestamp_token() {
        assert_eq!(payload_body(" 21.5 ", false), "21.5");
        assert_eq!(payload_body("2020-06-15T12:00:00Z  21.5", true), "21.5");
        assert_eq!(payload_body("2020-06-15T12:00:00Z", true), "");
    }

    #[tokio::test]
    async fn test_timestamped_value_on_watched_topic() {
        let agg = aggregator(&["t1"]);
        let targets = IngestTargets::new()
            .with_aggregator(agg.handle())
            .watch("dev/temp", "t1");
        let (tx, rx) = mpsc::channel(4);

        tx.send(parse_feed_line("dev/temp 2020-06-15T12:00:00Z 19.25").unwrap())
            .await
            .unwrap();
        drop(tx);

        let stats = run_ingestion(rx, targets).await;
        assert_eq!(stats.values_applied, 1);
        assert_eq!(agg.handle().current_value("t1"), Some(19.25));
    }

    fn aggregator(keys: &[&str]) -> PeriodicAggregator {
        let config = AggregatorConfig {
            watch_keys: keys.iter().map(|k| k.to_string()).collect(),
            step_interval: Duration::from_secs(1),
            steps_per_report: 1,
        };
        PeriodicAggregator::new(config, Box::new(|_| {})).unwrap()
    }

    #[tokio::test]
    async fn test_values_and_watched_topics_feed_aggregator() {
        let agg = aggregator(&["t1", "h1"]);
        let targets = IngestTargets::new()
            .with_aggregator(agg.handle())
            .watch("dev/temp", "t1");
        let (tx, rx) = mpsc::channel(16);

        tx.send(FeedEvent::Value {
            name: "h1".to_string(),
            value: 40.0,
        })
        .await
        .unwrap();
        tx.send(FeedEvent::Value {
            name: "nope".to_string(),
            value: 1.0,
        })
        .await
        .unwrap();
        tx.send(parse_feed_line("dev/temp 21.5").unwrap()).await.unwrap();
        tx.send(parse_feed_line("dev/temp offline").unwrap()).await.unwrap();
        tx.send(parse_feed_line("other/topic 3").unwrap()).await.unwrap();
        drop(tx);

        let stats = run_ingestion(rx, targets).await;
        assert_eq!(stats.values_applied, 2);
        assert_eq!(stats.values_ignored, 2);
        assert_eq!(stats.messages_routed, 0);

        let handle = agg.handle();
        assert_eq!(handle.current_value("t1"), Some(21.5));
        assert_eq!(handle.current_value("h1"), Some(40.0));
    }

    #[tokio::test]
    async fn test_messages_are_routed() {
        let dir = tempdir().unwrap();
        let router = LogRouter::new(RouterConfig {
            log_root: dir.path().to_path_buf(),
            ..RouterConfig::default()
        });
        let mut lines = router.subscribe();
        let targets = IngestTargets::new().with_router(router.clone());
        let (tx, rx) = mpsc::channel(16);

        tx.send(parse_feed_line("dev/log booted ok").unwrap()).await.unwrap();
        drop(tx);

        let stats = run_ingestion(rx, targets).await;
        assert_eq!(stats.messages_routed, 1);

        let written = lines.recv().await.unwrap();
        assert_eq!(written.topic, "dev/log");
        assert!(written.line.ends_with(" booted ok"));
        assert!(written
            .filename
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("dev-log-"));
        router.shutdown().await;
    }
}
