//! Per-contract raw bars grouped by trading date.
//!
//! The book is built once per request and shared read-only by the scheduler
//! and the series builder for every tenor.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use contfut_core::{ContractSpec, DateRange, RawContractBar};
use tracing::warn;

use crate::resolver::ResolvedContract;

/// Daily aggregate used by roll criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyStat {
    /// Total volume over the trading date.
    pub volume: f64,
    /// Last reported open interest of the trading date.
    pub open_interest: Option<f64>,
}

/// Raw bars of one contract.
#[derive(Debug, Clone)]
pub struct ContractHistory {
    pub symbol: String,
    pub expiration: NaiveDate,
    days: BTreeMap<NaiveDate, Vec<RawContractBar>>,
    stats: BTreeMap<NaiveDate, DailyStat>,
    /// Dates whose bars arrived out of order, duplicated or mislabelled.
    corrupt: BTreeSet<NaiveDate>,
}

impl ContractHistory {
    /// Group bars by trading date, flagging ordering violations per date.
    pub fn from_bars(
        symbol: impl Into<String>,
        expiration: NaiveDate,
        bars: Vec<RawContractBar>,
        spec: &ContractSpec,
    ) -> Self {
        let symbol = symbol.into();
        let mut days: BTreeMap<NaiveDate, Vec<RawContractBar>> = BTreeMap::new();
        let mut corrupt = BTreeSet::new();
        let mut prev: Option<(chrono::DateTime<chrono::Utc>, NaiveDate)> = None;

        for bar in bars {
            let date = spec.trading_date(bar.ts);
            if bar.symbol != symbol {
                warn!(expected = %symbol, got = %bar.symbol, %date, "bar for another contract");
                corrupt.insert(date);
                continue;
            }
            if let Some((prev_ts, prev_date)) = prev {
                if bar.ts <= prev_ts {
                    warn!(%symbol, %date, "raw bars out of order or duplicated");
                    corrupt.insert(date);
                    corrupt.insert(prev_date);
                    continue;
                }
            }
            prev = Some((bar.ts, date));
            days.entry(date).or_default().push(bar);
        }

        for date in &corrupt {
            days.remove(date);
        }

        let stats = days
            .iter()
            .map(|(date, bars)| {
                if bars
                    .iter()
                    .any(|b| !b.volume.is_finite() || b.open_interest.is_some_and(|oi| !oi.is_finite()))
                {
                    warn!(%symbol, %date, "non-finite volume or open interest ignored");
                }
                let volume = bars.iter().map(|b| b.volume).filter(|v| v.is_finite()).sum();
                let open_interest = bars
                    .iter()
                    .rev()
                    .find_map(|b| b.open_interest.filter(|oi| oi.is_finite()));
                (
                    *date,
                    DailyStat {
                        volume,
                        open_interest,
                    },
                )
            })
            .collect();

        Self {
            symbol,
            expiration,
            days,
            stats,
            corrupt,
        }
    }

    /// Bars on a trading date; `None` if absent or corrupt.
    pub fn bars_on(&self, date: NaiveDate) -> Option<&[RawContractBar]> {
        self.days.get(&date).map(Vec::as_slice)
    }

    /// Does the contract have usable bars on the date?
    pub fn has_bars(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    /// Did the contract trade (positive volume) on the date?
    pub fn traded_on(&self, date: NaiveDate) -> bool {
        self.stats.get(&date).is_some_and(|s| s.volume > 0.0)
    }

    /// Daily aggregate for a date.
    pub fn stat(&self, date: NaiveDate) -> Option<&DailyStat> {
        self.stats.get(&date)
    }

    /// Trading dates with usable bars.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// First trading date with any bar, usable or corrupt.
    pub fn first_date(&self) -> Option<NaiveDate> {
        let usable = self.days.keys().next().copied();
        let corrupt = self.corrupt.first().copied();
        usable.into_iter().chain(corrupt).min()
    }

    /// Dates flagged as corrupt.
    pub fn corrupt_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.corrupt
    }

    /// Is the contract entirely without usable bars?
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Histories for every candidate contract of one request, in candidate order.
#[derive(Debug, Clone, Default)]
pub struct ContractBook {
    contracts: Vec<ContractHistory>,
    index: HashMap<String, usize>,
}

impl ContractBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contract's bars. Candidates must be added in expiration order.
    pub fn add(&mut self, contract: &ResolvedContract, bars: Vec<RawContractBar>, spec: &ContractSpec) {
        let history = ContractHistory::from_bars(contract.code.clone(), contract.expiration, bars, spec);
        self.index.insert(contract.code.clone(), self.contracts.len());
        self.contracts.push(history);
    }

    /// History by symbol.
    pub fn get(&self, symbol: &str) -> Option<&ContractHistory> {
        self.index.get(symbol).map(|&i| &self.contracts[i])
    }

    /// History by candidate position.
    pub fn at(&self, position: usize) -> Option<&ContractHistory> {
        self.contracts.get(position)
    }

    /// Number of contracts.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Is the book empty?
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Sorted union of trading dates inside `range`, including corrupt dates.
    pub fn trading_calendar(&self, range: &DateRange) -> Vec<NaiveDate> {
        let mut dates = BTreeSet::new();
        for history in &self.contracts {
            dates.extend(history.dates().filter(|d| range.contains(*d)));
            dates.extend(history.corrupt_dates().iter().copied().filter(|d| range.contains(*d)));
        }
        dates.into_iter().collect()
    }
}
