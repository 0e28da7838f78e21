//! Trailing-window statistics for crossover roll criteria.
//!
//! The window holds the most recent trading dates up to and including the
//! as-of date, so averages never look past the decision date.

use std::collections::VecDeque;

use chrono::NaiveDate;
use contfut_ingestion::{ContractHistory, DailyStat};
use serde::{Deserialize, Serialize};

/// Daily quantity compared by a crossover rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollMetric {
    Volume,
    OpenInterest,
}

impl RollMetric {
    /// Value of the metric for one day, if it was observed.
    pub fn value(self, stat: &DailyStat) -> Option<f64> {
        match self {
            RollMetric::Volume => (stat.volume > 0.0).then_some(stat.volume),
            RollMetric::OpenInterest => stat.open_interest,
        }
    }
}

/// Rolling window of the last N trading dates.
#[derive(Debug, Clone)]
pub struct TrailingWindow {
    /// Window size in trading dates.
    window: usize,
    /// Dates in the window, oldest first.
    dates: VecDeque<NaiveDate>,
}

impl TrailingWindow {
    /// Create a new trailing window.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            dates: VecDeque::with_capacity(window),
        }
    }

    /// Advance the window to a new trading date.
    pub fn push(&mut self, date: NaiveDate) {
        if self.dates.len() >= self.window {
            self.dates.pop_front();
        }
        self.dates.push_back(date);
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.window > 0 && self.dates.len() >= self.window
    }

    /// Get the number of dates held.
    pub fn count(&self) -> usize {
        self.dates.len()
    }

    /// Dates in the window, oldest first.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    /// Average of a metric over the window for one contract.
    ///
    /// With `require_every_day`, any date without an observation yields `None`;
    /// otherwise missing days count as zero.
    pub fn mean(
        &self,
        history: &ContractHistory,
        metric: RollMetric,
        require_every_day: bool,
    ) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        let mut sum = 0.0;
        for date in self.dates() {
            match history.stat(date).and_then(|s| metric.value(s)) {
                Some(v) => sum += v,
                None if require_every_day => return None,
                None => {}
            }
        }
        Some(sum / self.dates.len() as f64)
    }

    /// Clear all state.
    pub fn reset(&mut self) {
        self.dates.clear();
    }
}
