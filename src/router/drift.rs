//! Drift window: the accepted timestamp range around the receive clock

use chrono::{DateTime, Duration, Local};

#[derive(Debug, Clone, PartialEq)]
pub struct DriftWindow {
    max_drift: Duration,
    current: Option<DateTime<Local>>,
}

impl DriftWindow {
    pub fn new(max_drift: Duration) -> Self {
        Self {
            max_drift,
            current: None,
        }
    }

    pub fn max_drift(&self) -> Duration {
        self.max_drift
    }

    /// Move the current timestamp forward to `ts`; never moves backwards.
    pub fn advance(&mut self, ts: DateTime<Local>) {
        if self.current.map_or(true, |current| ts > current) {
            self.current = Some(ts);
        }
    }

    pub fn current(&self) -> Option<DateTime<Local>> {
        self.current
    }

    pub fn min(&self) -> Option<DateTime<Local>> {
        self.current.map(|c| c - self.max_drift)
    }

    pub fn max(&self) -> Option<DateTime<Local>> {
        self.current.map(|c| c + self.max_drift)
    }

    /// Force `ts` into `[min, max]`; the flag is set when it moved.
    ///
    /// Before the first `advance` every timestamp is accepted as-is.
    pub fn clamp(&self, ts: DateTime<Local>) -> (DateTime<Local>, bool) {
        match (self.min(), self.max()) {
            (Some(min), _) if ts < min => (min, true),
            (_, Some(max)) if ts > max => (max, true),
            _ => (ts, false),
        }
    }

    /// Whether the half-open range `[start, end)` still touches the window.
    ///
    /// Partial overlap counts as overlapping.
    pub fn overlaps(&self, start: DateTime<Local>, end: DateTime<Local>) -> bool {
        match (self.min(), self.max()) {
            (Some(min), Some(max)) => !(end <= min || start > max),
            _ => true,
        }
    }
}
