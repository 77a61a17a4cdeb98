//! Timer-driven wrapper around [`Aggregator`]
//!
//! `Stopped → Running` on `start()`, `Running → Stopped` on `stop()`.
//! Starting twice is an error; stopping twice is a no-op. A tick task that
//! died (a panicking report callback) counts as stopped.

use super::{AggregationReport, Aggregator, AggregatorConfig, AggregatorError, ReportCallback};
use crate::scheduler::{schedule_every, ScheduledTask};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock(core: &Mutex<Aggregator>) -> MutexGuard<'_, Aggregator> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PeriodicAggregator {
    core: Arc<Mutex<Aggregator>>,
    step_interval: Duration,
    ticker: Option<ScheduledTask>,
}

impl PeriodicAggregator {
    pub fn new(config: AggregatorConfig, callback: ReportCallback) -> Result<Self, AggregatorError> {
        if config.step_interval.is_zero() {
            return Err(AggregatorError::InvalidConfig(
                "step_interval must be non-zero".to_string(),
            ));
        }

        let core = Aggregator::new(config.watch_keys, config.steps_per_report, callback)?;

        Ok(Self {
            core: Arc::new(Mutex::new(core)),
            step_interval: config.step_interval,
            ticker: None,
        })
    }

    /// Begin ticking every `step_interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), AggregatorError> {
        if self.is_running() {
            return Err(AggregatorError::AlreadyStarted);
        }
        if self.ticker.take().is_some() {
            log::warn!("⚠️  Previous aggregator tick task ended unexpectedly; restarting");
        }

        let core = self.core.clone();
        let ticker = schedule_every("aggregator-tick", self.step_interval, move || {
            lock(&core).step();
        })?;

        let (keys, steps) = {
            let core = lock(&self.core);
            (core.watch_keys().len(), core.steps_per_report())
        };
        log::info!(
            "⏰ Aggregator started: {} channels, tick {}ms, report every {} ticks",
            keys,
            self.step_interval.as_millis(),
            steps
        );

        self.ticker = Some(ticker);
        Ok(())
    }

    /// Halt future ticks. Channel state is kept.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
            log::info!("⏹️  Aggregator stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.as_ref().map_or(false, ScheduledTask::is_running)
    }

    /// Run one tick by hand
    pub fn step(&self) {
        lock(&self.core).step();
    }

    pub fn report(&self) -> AggregationReport {
        lock(&self.core).report()
    }

    pub fn handle(&self) -> AggregatorHandle {
        AggregatorHandle {
            core: self.core.clone(),
        }
    }
}

impl Drop for PeriodicAggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cloneable feed-side view of a running aggregator
#[derive(Clone)]
pub struct AggregatorHandle {
    core: Arc<Mutex<Aggregator>>,
}

impl AggregatorHandle {
    /// Returns false when `key` is not watched or `value` is not finite.
    pub fn set_value(&self, key: &str, value: f64) -> bool {
        lock(&self.core).set_value(key, value)
    }

    pub fn watches(&self, key: &str) -> bool {
        lock(&self.core).watches(key)
    }

    pub fn current_value(&self, key: &str) -> Option<f64> {
        lock(&self.core).current_value(key)
    }

    pub fn history(&self, key: &str) -> Option<Vec<Option<f64>>> {
        lock(&self.core).history(key).map(|h| h.to_vec())
    }
}
