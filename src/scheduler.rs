//! Cancellable fixed-interval task scheduling
//!
//! `schedule_every` spawns a background task driven by `tokio::time::interval`
//! and returns a [`ScheduledTask`] handle. Cancelling (or dropping) the handle
//! halts future invocations; an invocation already running is not interrupted
//! because the callback is synchronous.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    ZeroPeriod(String),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::ZeroPeriod(name) => {
                write!(f, "Scheduled task '{}' must have a non-zero period", name)
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Handle to a periodic background task
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct ScheduledTask {
    name: String,
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// False once cancelled, or if a tick callback panicked.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Halt future invocations
    pub fn cancel(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::debug!("⏹️  Cancelled scheduled task '{}'", self.name);
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Run `f` every `period`, first invocation one full period from now.
///
/// Must be called from within a Tokio runtime. Late ticks are delayed rather
/// than bursted, so a slow callback never runs twice back to back.
pub fn schedule_every<F>(
    name: impl Into<String>,
    period: Duration,
    mut f: F,
) -> Result<ScheduledTask, ScheduleError>
where
    F: FnMut() + Send + 'static,
{
    let name = name.into();
    if period.is_zero() {
        return Err(ScheduleError::ZeroPeriod(name));
    }

    log::debug!("⏰ Scheduling '{}' every {}ms", name, period.as_millis());

    let handle = tokio::spawn(async move {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            f();
        }
    });

    Ok(ScheduledTask {
        name,
        period,
        handle: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = schedule_every("counter", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        // No immediate first tick
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_running());
        assert_eq!(task.name(), "counter");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_halts_future_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let task = schedule_every("cancel-me", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;
        task.cancel();
        let seen = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        {
            let _task = schedule_every("dropped", Duration::from_millis(10), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let result = schedule_every("bad", Duration::ZERO, || {});
        assert_eq!(result.unwrap_err(), ScheduleError::ZeroPeriod("bad".to_string()));
    }
}
