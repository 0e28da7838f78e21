//! Roll strategies.
//!
//! Each strategy answers the same question: should the tenor leave `current`
//! for `next` on `as_of`, given only data up to and including `as_of`.

use std::cmp::Ordering;

use chrono::NaiveDate;
use contfut_core::calendar::business_days_between;
use contfut_core::{Error, Result, RollConfig};
use contfut_ingestion::ContractHistory;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::trailing::{RollMetric, TrailingWindow};

/// Roll criterion with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollStrategy {
    /// Roll a fixed number of business days before expiration.
    Calendar { days_before_expiry: u32 },
    /// Roll when next's trailing average volume exceeds current's.
    VolumeCrossover {
        window: usize,
        fallback_days_before_expiry: u32,
    },
    /// Roll when next's trailing average open interest exceeds current's.
    OpenInterestCrossover {
        window: usize,
        fallback_days_before_expiry: u32,
    },
}

impl Default for RollStrategy {
    fn default() -> Self {
        RollStrategy::Calendar {
            days_before_expiry: 5,
        }
    }
}

impl RollStrategy {
    /// Build a strategy from configuration.
    ///
    /// Exactly one criterion must be configured; combining criteria is ambiguous.
    pub fn from_config(config: &RollConfig) -> Result<Self> {
        let fallback = config.fallback_days_before_expiry;
        let strategy = match (
            config.days_before_expiry,
            config.volume_window,
            config.open_interest_window,
        ) {
            (Some(days), None, None) => RollStrategy::Calendar {
                days_before_expiry: days,
            },
            (None, Some(window), None) => RollStrategy::VolumeCrossover {
                window,
                fallback_days_before_expiry: fallback,
            },
            (None, None, Some(window)) => RollStrategy::OpenInterestCrossover {
                window,
                fallback_days_before_expiry: fallback,
            },
            (None, None, None) => return Err(Error::config("no roll criterion configured")),
            (calendar, volume, oi) => {
                let mut named = Vec::new();
                if calendar.is_some() {
                    named.push("calendar");
                }
                if volume.is_some() {
                    named.push("volume crossover");
                }
                if oi.is_some() {
                    named.push("open interest crossover");
                }
                return Err(Error::ambiguous_roll(format!(
                    "{} configured together without a tie-break",
                    named.join(" and ")
                )));
            }
        };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Reject parameters that can never trigger.
    pub fn validate(&self) -> Result<()> {
        match self {
            RollStrategy::VolumeCrossover { window: 0, .. }
            | RollStrategy::OpenInterestCrossover { window: 0, .. } => {
                Err(Error::config("crossover window must be at least one trading day"))
            }
            _ => Ok(()),
        }
    }

    /// Trailing window length in trading dates.
    pub fn window(&self) -> usize {
        match self {
            RollStrategy::Calendar { .. } => 1,
            RollStrategy::VolumeCrossover { window, .. }
            | RollStrategy::OpenInterestCrossover { window, .. } => *window,
        }
    }

    /// Business days before expiration at which the calendar rule (or safety net) fires.
    pub fn calendar_days(&self) -> u32 {
        match self {
            RollStrategy::Calendar { days_before_expiry } => *days_before_expiry,
            RollStrategy::VolumeCrossover {
                fallback_days_before_expiry,
                ..
            }
            | RollStrategy::OpenInterestCrossover {
                fallback_days_before_expiry,
                ..
            } => *fallback_days_before_expiry,
        }
    }

    /// Is the calendar rule due for a contract expiring on `expiration`?
    pub fn calendar_due(&self, expiration: NaiveDate, as_of: NaiveDate) -> bool {
        business_days_between(as_of, expiration) <= self.calendar_days()
    }

    /// Should the tenor roll from `current` to `next` on `as_of`?
    ///
    /// Without a `next` contract only the calendar criterion can fire.
    pub fn should_roll(
        &self,
        current: &ContractHistory,
        next: Option<&ContractHistory>,
        as_of: NaiveDate,
        window: &TrailingWindow,
    ) -> bool {
        if self.calendar_due(current.expiration, as_of) {
            return true;
        }
        let metric = match self {
            RollStrategy::Calendar { .. } => return false,
            RollStrategy::VolumeCrossover { .. } => RollMetric::Volume,
            RollStrategy::OpenInterestCrossover { .. } => RollMetric::OpenInterest,
        };
        let Some(next) = next else {
            return false;
        };
        crossed(current, next, metric, window)
    }
}

/// Strict crossover; ties keep the nearer expiration.
fn crossed(
    current: &ContractHistory,
    next: &ContractHistory,
    metric: RollMetric,
    window: &TrailingWindow,
) -> bool {
    let Some(next_mean) = window.mean(next, metric, true) else {
        return false;
    };
    let current_mean = window.mean(current, metric, false).unwrap_or(0.0);
    // OrderedFloat ranks NaN above every number.
    if !next_mean.is_finite() || !current_mean.is_finite() {
        return false;
    }
    OrderedFloat(next_mean).cmp(&OrderedFloat(current_mean)) == Ordering::Greater
}
