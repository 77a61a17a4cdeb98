//! Synchronous sampling/averaging core
//!
//! `step()` is the only place a report is produced, and producing a report
//! always resets every channel.

use super::channel::Channel;
use super::{AggregationReport, AggregatorError, ReportCallback};
use std::collections::{HashMap, HashSet};

pub struct Aggregator {
    watch_keys: Vec<String>,
    channels: HashMap<String, Channel>,
    steps_per_report: u64,
    step_number: u64,
    callback: ReportCallback,
}

impl Aggregator {
    pub fn new(
        watch_keys: Vec<String>,
        steps_per_report: u64,
        callback: ReportCallback,
    ) -> Result<Self, AggregatorError> {
        if steps_per_report == 0 {
            return Err(AggregatorError::InvalidConfig(
                "steps_per_report must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for key in &watch_keys {
            if !seen.insert(key.as_str()) {
                return Err(AggregatorError::DuplicateKey(key.clone()));
            }
        }

        let channels = watch_keys
            .iter()
            .map(|k| (k.clone(), Channel::new()))
            .collect();

        Ok(Self {
            watch_keys,
            channels,
            steps_per_report,
            step_number: 0,
            callback,
        })
    }

    pub fn watch_keys(&self) -> &[String] {
        &self.watch_keys
    }

    pub fn watches(&self, key: &str) -> bool {
        self.channels.contains_key(key)
    }

    pub fn steps_per_report(&self) -> u64 {
        self.steps_per_report
    }

    /// Ticks taken since the aggregator was created
    pub fn tick_count(&self) -> u64 {
        self.step_number
    }

    /// Overwrite the current value of a watched channel.
    ///
    /// Unwatched keys and non-finite values are ignored; returns whether the
    /// value was recorded.
    pub fn set_value(&mut self, key: &str, value: f64) -> bool {
        if !value.is_finite() {
            log::debug!("Ignoring non-finite value {} for '{}'", value, key);
            return false;
        }

        match self.channels.get_mut(key) {
            Some(channel) => {
                channel.set(value);
                true
            }
            None => false,
        }
    }

    pub fn current_value(&self, key: &str) -> Option<f64> {
        self.channels.get(key).and_then(|c| c.current())
    }

    pub fn history(&self, key: &str) -> Option<&[Option<f64>]> {
        self.channels.get(key).map(|c| c.history())
    }

    pub fn snapshot(&mut self) {
        for channel in self.channels.values_mut() {
            channel.snapshot();
        }
    }

    /// Per-channel means over the current window; channels without any
    /// samples are left out.
    pub fn report(&self) -> AggregationReport {
        self.watch_keys
            .iter()
            .filter_map(|key| {
                let mean = self.channels.get(key)?.mean()?;
                Some((key.clone(), mean))
            })
            .collect()
    }

    /// Snapshot, and every `steps_per_report` ticks hand the report to the
    /// callback and reset all channels.
    ///
    /// The callback runs inline; a panic in it propagates to the caller.
    pub fn step(&mut self) {
        self.snapshot();
        self.step_number += 1;

        if self.step_number % self.steps_per_report == 0 {
            let report = self.report();
            log::debug!(
                "📊 Report after tick {}: {} of {} channels sampled",
                self.step_number,
                report.len(),
                self.watch_keys.len()
            );
            (self.callback)(report);

            for channel in self.channels.values_mut() {
                channel.reset();
            }
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("watch_keys", &self.watch_keys)
            .field("steps_per_report", &self.steps_per_report)
            .field("step_number", &self.step_number)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collecting(keys: &[&str], steps: u64) -> (Aggregator, Arc<Mutex<Vec<AggregationReport>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let agg = Aggregator::new(
            keys.iter().map(|k| k.to_string()).collect(),
            steps,
            Box::new(move |r| sink.lock().unwrap().push(r)),
        )
        .unwrap();
        (agg, reports)
    }

    #[test]
    fn test_report_averages_present_samples() {
        let (mut agg, _) = collecting(&["t1"], 10);

        agg.channels.insert(
            "t1".to_string(),
            Channel::from_history(vec![Some(10.0), None, Some(20.0)]),
        );

        assert_eq!(agg.report().get("t1"), Some(&15.0));
    }

    #[test]
    fn test_all_missing_channel_omitted() {
        let (mut agg, _) = collecting(&["t1", "t2"], 10);

        agg.set_value("t2", 3.0);
        agg.snapshot();
        agg.snapshot();

        let report = agg.report();
        assert!(!report.contains_key("t1"));
        assert_eq!(report.get("t2"), Some(&3.0));
    }

    #[test]
    fn test_history_grows_every_tick_for_every_channel() {
        let (mut agg, _) = collecting(&["a", "b"], 10);

        agg.set_value("a", 1.0);
        agg.step();
        agg.step();
        agg.set_value("b", 2.0);
        agg.step();

        assert_eq!(agg.history("a").unwrap(), &[Some(1.0), Some(1.0), Some(1.0)]);
        assert_eq!(agg.history("b").unwrap(), &[None, None, Some(2.0)]);
    }

    #[test]
    fn test_callback_fires_once_per_cycle_and_resets() {
        let (mut agg, reports) = collecting(&["t1"], 3);

        agg.set_value("t1", 10.0);
        agg.step();
        agg.step();
        assert!(reports.lock().unwrap().is_empty());

        agg.step();
        assert_eq!(reports.lock().unwrap().len(), 1);
        assert_eq!(reports.lock().unwrap()[0].get("t1"), Some(&10.0));

        assert_eq!(agg.history("t1").unwrap().len(), 0);
        assert_eq!(agg.current_value("t1"), None);
        assert_eq!(agg.tick_count(), 3);
    }

    #[test]
    fn test_value_persists_until_report() {
        let (mut agg, reports) = collecting(&["t1"], 3);

        agg.set_value("t1", 10.0);
        for _ in 0..3 {
            agg.step();
        }

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].len(), 1);
        assert_eq!(reports[0]["t1"], 10.0);
    }

    #[test]
    fn test_empty_report_is_delivered() {
        let (mut agg, reports) = collecting(&["t1"], 2);

        agg.step();
        agg.step();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_empty());
    }

    #[test]
    fn test_unwatched_and_non_finite_ignored() {
        let (mut agg, _) = collecting(&["t1"], 2);

        assert!(!agg.set_value("nope", 1.0));
        assert!(!agg.set_value("t1", f64::NAN));
        assert!(agg.set_value("t1", 1.5));
        assert_eq!(agg.current_value("t1"), Some(1.5));
        assert!(agg.history("nope").is_none());
    }

    #[test]
    fn test_invalid_configuration() {
        let err = Aggregator::new(vec!["a".into()], 0, Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidConfig(_)));

        let err = Aggregator::new(vec!["a".into(), "a".into()], 1, Box::new(|_| {})).unwrap_err();
        assert_eq!(err, AggregatorError::DuplicateKey("a".to_string()));
    }

    #[test]
    fn test_report_is_side_effect_free() {
        let (mut agg, _) = collecting(&["t1"], 5);
        agg.set_value("t1", 2.0);
        agg.snapshot();

        let first = agg.report();
        let second = agg.report();
        assert_eq!(first, second);
        assert_eq!(agg.history("t1").unwrap().len(), 1);
    }
}
