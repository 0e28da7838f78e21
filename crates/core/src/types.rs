//! Core data types for continuous contract construction.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Position in the expiration-ranked contract list (0 = front month).
pub type Tenor = usize;

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::config(format!("date range start {start} after end {end}")));
        }
        Ok(Self { start, end })
    }

    /// Is the date inside the range?
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Does `[start, end]` intersect this range?
    #[inline]
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }
}

/// One bar of one specific expiring contract, as delivered by the raw bar source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawContractBar {
    /// Bar timestamp (UTC).
    pub ts: DateTime<Utc>,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Volume.
    pub volume: f64,
    /// Open interest, if reported.
    pub open_interest: Option<f64>,
    /// Owning contract symbol (e.g., "ESH24").
    pub symbol: String,
}

/// Price of the incoming contract used at a roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceReference {
    /// Close of the incoming contract's first bar on the roll date.
    #[default]
    Close,
    /// Open of the incoming contract's first bar on the roll date.
    Open,
}

/// Switch of the active contract for one tenor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollEvent {
    /// First trading date on which the incoming contract is active.
    pub date: NaiveDate,
    /// Tenor the roll belongs to.
    pub tenor: Tenor,
    /// Contract rolled out of.
    pub outgoing: String,
    /// Contract rolled into.
    pub incoming: String,
    /// Last close of the outgoing contract while it was active.
    pub outgoing_close: f64,
    /// Incoming contract's reference price on the roll date.
    pub incoming_price: f64,
    /// Which incoming price was used.
    pub reference: PriceReference,
    /// `incoming_price / outgoing_close`, present only when both are strictly positive.
    pub ratio: Option<f64>,
    /// `incoming_price - outgoing_close`.
    pub difference: f64,
}

impl RollEvent {
    /// Create a roll event, deriving ratio and difference from the two prices.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: NaiveDate,
        tenor: Tenor,
        outgoing: impl Into<String>,
        incoming: impl Into<String>,
        outgoing_close: f64,
        incoming_price: f64,
        reference: PriceReference,
    ) -> Self {
        let ratio = (outgoing_close > 0.0 && incoming_price > 0.0)
            .then(|| incoming_price / outgoing_close);
        Self {
            date,
            tenor,
            outgoing: outgoing.into(),
            incoming: incoming.into(),
            outgoing_close,
            incoming_price,
            reference,
            ratio,
            difference: incoming_price - outgoing_close,
        }
    }
}

/// One bar of a continuous series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousBar {
    /// Bar timestamp (UTC).
    pub ts: DateTime<Utc>,
    /// Tenor index.
    pub tenor: Tenor,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_interest: Option<f64>,
    /// Raw contract active for this bar.
    pub contract: String,
    /// Cumulative adjustment applied (factor or offset), `None` when unadjusted.
    pub adjustment: Option<f64>,
}

impl ContinuousBar {
    /// Wrap a raw bar without adjustment.
    pub fn from_raw(bar: &RawContractBar, tenor: Tenor) -> Self {
        Self {
            ts: bar.ts,
            tenor,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            open_interest: bar.open_interest,
            contract: bar.symbol.clone(),
            adjustment: None,
        }
    }
}

/// Back-adjustment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMethod {
    /// No adjustment; prices are the raw spliced prices.
    None,
    /// Multiplicative factor (preserves percentage returns).
    #[default]
    Ratio,
    /// Constant point offset (preserves absolute differences).
    Additive,
}

impl AdjustmentMethod {
    /// Neutral cumulative value for this method.
    pub fn identity(self) -> f64 {
        match self {
            AdjustmentMethod::Ratio => 1.0,
            AdjustmentMethod::None | AdjustmentMethod::Additive => 0.0,
        }
    }

    /// Apply a cumulative adjustment to a price.
    #[inline]
    pub fn apply(self, price: f64, cumulative: f64) -> f64 {
        match self {
            AdjustmentMethod::None => price,
            AdjustmentMethod::Ratio => price * cumulative,
            AdjustmentMethod::Additive => price + cumulative,
        }
    }

    /// Undo a cumulative adjustment.
    #[inline]
    pub fn restore(self, price: f64, cumulative: f64) -> f64 {
        match self {
            AdjustmentMethod::None => price,
            AdjustmentMethod::Ratio => price / cumulative,
            AdjustmentMethod::Additive => price - cumulative,
        }
    }
}

/// Which end of the history keeps its real price level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    /// History is rescaled to the most recent contract's level.
    #[default]
    Backward,
    /// Later bars are rescaled to the earliest contract's level.
    Forward,
}

/// A roll event together with the cumulative adjustment in force at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: RollEvent,
    /// Backward: applied to bars before `event.date` (and after the previous roll).
    /// Forward: applied to bars from `event.date` until the next roll.
    pub cumulative: f64,
}

/// Provenance of every adjusted price in a continuous series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentAudit {
    pub method: AdjustmentMethod,
    pub direction: AdjustmentDirection,
    pub reference: PriceReference,
    /// Entries in chronological roll order.
    pub entries: Vec<AuditEntry>,
}

impl AdjustmentAudit {
    /// Cumulative adjustment applied to bars on `date`.
    pub fn adjustment_on(&self, date: NaiveDate) -> f64 {
        let identity = self.method.identity();
        match self.direction {
            AdjustmentDirection::Backward => self
                .entries
                .iter()
                .find(|e| date < e.event.date)
                .map_or(identity, |e| e.cumulative),
            AdjustmentDirection::Forward => self
                .entries
                .iter()
                .rev()
                .find(|e| date >= e.event.date)
                .map_or(identity, |e| e.cumulative),
        }
    }

    /// Reproduce the raw price behind an adjusted price on `date`.
    pub fn restore(&self, adjusted_price: f64, date: NaiveDate) -> f64 {
        self.method.restore(adjusted_price, self.adjustment_on(date))
    }
}

/// Why a due roll could not be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GapReason {
    /// The candidate list has no later contract.
    NoCandidate,
    /// The next contract has no bar on this date.
    NextNotTrading { next: String },
}

/// A date on which a due roll was deferred and the current contract held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollGap {
    pub date: NaiveDate,
    /// Contract held.
    pub held: String,
    pub reason: GapReason,
}

/// A constructed continuous series for one (product, tenor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousSeries {
    pub product: String,
    pub tenor: Tenor,
    pub bars: Vec<ContinuousBar>,
    pub roll_events: Vec<RollEvent>,
    pub audit: AdjustmentAudit,
    pub gaps: Vec<RollGap>,
}

impl ContinuousSeries {
    /// Are bar timestamps strictly increasing?
    pub fn is_strictly_increasing(&self) -> bool {
        self.bars.windows(2).all(|w| w[0].ts < w[1].ts)
    }

    /// Last bar, if any.
    pub fn last_bar(&self) -> Option<&ContinuousBar> {
        self.bars.last()
    }
}
