//! Synthetic ES market used by the tests of this crate.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use contfut_core::calendar::is_business_day;
use contfut_core::contract::QUARTERLY_MONTHS;
use contfut_core::{ContractSpec, ExpirationRule, RawContractBar};
use contfut_ingestion::{InMemoryBarSource, StaticSpecRegistry};

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn business_days(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut date = from;
    while date <= to {
        if is_business_day(date) {
            out.push(date);
        }
        date += Duration::days(1);
    }
    out
}

/// One daily bar per date, priced by `price`.
pub fn daily_bars(symbol: &str, dates: &[NaiveDate], price: impl Fn(NaiveDate) -> f64) -> Vec<RawContractBar> {
    dates
        .iter()
        .map(|&date| {
            let p = price(date);
            RawContractBar {
                ts: Utc.from_utc_datetime(&date.and_hms_opt(21, 0, 0).unwrap()),
                open: p,
                high: p + 0.5,
                low: p - 0.5,
                close: p,
                volume: 1000.0,
                open_interest: Some(20_000.0),
                symbol: symbol.to_string(),
            }
        })
        .collect()
}

pub fn es_spec() -> ContractSpec {
    ContractSpec::new("ES", QUARTERLY_MONTHS.to_vec(), ExpirationRule::third_friday(), 0.25, 50.0)
}

pub fn registry() -> StaticSpecRegistry {
    let mut registry = StaticSpecRegistry::new();
    registry.insert(es_spec());
    registry
}

/// Range covering the ESH24 -> ESM24 -> ESU24 rolls.
pub fn range_bounds() -> (NaiveDate, NaiveDate) {
    (d(2024, 3, 1), d(2024, 6, 28))
}

/// ESH24 flat at 100, ESM24 at 101, ESU24 at 103, every business day of the range.
pub fn flat_source() -> InMemoryBarSource {
    priced_source(|_, _| None)
}

/// Like [`flat_source`], with per-contract price overrides and dropped dates.
///
/// `price` returns `Some(Some(p))` to override, `Some(None)` to drop the bar.
pub fn priced_source(price: impl Fn(&str, NaiveDate) -> Option<Option<f64>>) -> InMemoryBarSource {
    let (start, end) = range_bounds();
    let dates = business_days(start, end);
    let mut source = InMemoryBarSource::new();
    for (symbol, level) in [("ESH24", 100.0), ("ESM24", 101.0), ("ESU24", 103.0)] {
        let kept: Vec<_> = dates
            .iter()
            .copied()
            .filter(|&date| !matches!(price(symbol, date), Some(None)))
            .collect();
        source.insert(daily_bars(symbol, &kept, |date| match price(symbol, date) {
            Some(Some(p)) => p,
            _ => level,
        }));
    }
    source
}
