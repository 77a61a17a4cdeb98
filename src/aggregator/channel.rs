//! Per-channel sample state

/// One watched value stream.
///
/// `current` is the last value set since the previous report; `history` gets
/// one entry per snapshot, `None` when nothing had been set yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    current: Option<f64>,
    history: Vec<Option<f64>>,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, value: f64) {
        self.current = Some(value);
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }

    pub fn history(&self) -> &[Option<f64>] {
        &self.history
    }

    /// Append the current value; it stays current for later snapshots.
    pub fn snapshot(&mut self) {
        self.history.push(self.current);
    }

    /// Mean of the non-missing snapshots, `None` if there are none
    pub fn mean(&self) -> Option<f64> {
        let (total, count) = self
            .history
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));

        if count > 0 {
            Some(total / count as f64)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.history.clear();
    }

    #[cfg(test)]
    pub(crate) fn from_history(history: Vec<Option<f64>>) -> Self {
        Self {
            current: history.last().copied().flatten(),
            history,
        }
    }
}
