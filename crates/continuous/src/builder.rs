//! Continuous contract builder.
//!
//! Orchestrates one product request: resolve candidates, fetch each raw
//! contract once, schedule the front month once, then splice and adjust every
//! requested tenor independently.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use contfut_core::{AdjustmentConfig, BuildConfig, ContinuousSeries, DateRange, Error, Result, Tenor};
use contfut_ingestion::{ContractBook, ContractResolver, RawBarSource, SpecRegistry};
use contfut_roll::{RollSchedule, RollScheduler, RollState, RollStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adjust::PriceAdjuster;
use crate::splice::SeriesSplicer;

/// One product build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub product: String,
    pub tenors: Vec<Tenor>,
    pub range: DateRange,
    pub roll: RollStrategy,
    pub adjustment: AdjustmentConfig,
}

impl BuildRequest {
    /// Front-month request with default roll and adjustment.
    pub fn new(product: impl Into<String>, range: DateRange) -> Self {
        Self {
            product: product.into(),
            tenors: vec![0],
            range,
            roll: RollStrategy::default(),
            adjustment: AdjustmentConfig::default(),
        }
    }

    /// Set the tenors to build.
    pub fn with_tenors(mut self, tenors: Vec<Tenor>) -> Self {
        self.tenors = tenors;
        self
    }

    /// Set the roll strategy.
    pub fn with_roll(mut self, roll: RollStrategy) -> Self {
        self.roll = roll;
        self
    }

    /// Set the adjustment configuration.
    pub fn with_adjustment(mut self, adjustment: AdjustmentConfig) -> Self {
        self.adjustment = adjustment;
        self
    }

    /// One request per configured product.
    pub fn from_config(config: &BuildConfig, range: DateRange) -> Result<Vec<Self>> {
        let roll = RollStrategy::from_config(&config.roll)?;
        Ok(config
            .products
            .iter()
            .map(|product| Self {
                product: product.clone(),
                tenors: config.tenors.clone(),
                range,
                roll,
                adjustment: config.adjustment,
            })
            .collect())
    }
}

/// Result of building one tenor.
#[derive(Debug)]
pub struct TenorOutcome {
    /// Series built; a prefix when `error` is set.
    pub series: ContinuousSeries,
    pub state: RollState,
    pub error: Option<Error>,
}

impl TenorOutcome {
    /// Was the tenor built over the whole calendar without error?
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.state != RollState::Exhausted
    }

    /// The series, or the error that cut it short.
    pub fn into_result(self) -> Result<ContinuousSeries> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.series),
        }
    }
}

/// Result of one product request.
#[derive(Debug)]
pub struct BuildReport {
    pub product: String,
    /// Candidate contracts considered, in expiration order.
    pub candidates: Vec<String>,
    pub outcomes: BTreeMap<Tenor, TenorOutcome>,
}

impl BuildReport {
    /// Series of a tenor, including failed prefixes.
    pub fn series(&self, tenor: Tenor) -> Option<&ContinuousSeries> {
        self.outcomes.get(&tenor).map(|o| &o.series)
    }

    /// Outcome of a tenor.
    pub fn outcome(&self, tenor: Tenor) -> Option<&TenorOutcome> {
        self.outcomes.get(&tenor)
    }

    /// Tenors that stopped with an error.
    pub fn failed_tenors(&self) -> Vec<Tenor> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.error.is_some())
            .map(|(t, _)| *t)
            .collect()
    }
}

/// Builds continuous series from a raw bar source and a spec registry.
pub struct ContinuousContractBuilder<S, R> {
    source: S,
    registry: R,
}

impl<S: RawBarSource, R: SpecRegistry> ContinuousContractBuilder<S, R> {
    /// Create a builder over the given collaborators.
    pub fn new(source: S, registry: R) -> Self {
        Self { source, registry }
    }

    /// Raw bar source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Build every requested tenor of one product.
    ///
    /// Product-level failures return `Err`; tenor-level failures are reported
    /// per tenor with the prefix built before the failure.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        if request.tenors.is_empty() {
            return Err(Error::config(format!("no tenors requested for {}", request.product)));
        }
        request.roll.validate()?;

        let spec = self.registry.get_spec(&request.product)?;
        let range = request.range;
        let max_tenor = request.tenors.iter().copied().max().unwrap_or(0);
        let candidates = ContractResolver::new(&spec).resolve(&range, max_tenor + 1)?;

        let mut book = ContractBook::new();
        // The active window only selects candidates. A deep tenor can hold a
        // contract long before its window opens, so fetch from the range start.
        for contract in &candidates {
            let start = range.start;
            let end = contract.expiration.min(range.end);
            let bars = if start > end {
                Vec::new()
            } else {
                // Pad by a day so session offsets cannot drop edge bars.
                self.source
                    .get_bars(
                        &request.product,
                        &contract.code,
                        start - Duration::days(1),
                        end + Duration::days(1),
                    )?
                    .into_iter()
                    .filter(|bar| {
                        let date = spec.trading_date(bar.ts);
                        date >= start && date <= end
                    })
                    .collect()
            };
            debug!(symbol = %contract.code, bars = bars.len(), %start, %end, "raw bars loaded");
            book.add(contract, bars, &spec);
        }

        let calendar = book.trading_calendar(&range);
        if calendar.is_empty() {
            return Err(Error::data(format!(
                "no raw bars for {} between {} and {}",
                request.product, range.start, range.end
            )));
        }

        let front = RollScheduler::new(&book, request.roll).schedule(&calendar);
        let splicer = SeriesSplicer::new(&book, request.adjustment.reference);
        let adjuster = PriceAdjuster::new(request.adjustment);

        let mut outcomes = BTreeMap::new();
        for &tenor in &request.tenors {
            if outcomes.contains_key(&tenor) {
                continue;
            }
            let schedule = front.for_tenor(tenor, &book);
            let outcome = build_tenor(&request.product, &schedule, &splicer, &adjuster);
            if let Some(err) = &outcome.error {
                warn!(product = %request.product, tenor, error = %err, bars = outcome.series.bars.len(), "tenor stopped early");
            }
            outcomes.insert(tenor, outcome);
        }

        info!(
            product = %request.product,
            start = %range.start,
            end = %range.end,
            candidates = candidates.len(),
            trading_days = calendar.len(),
            rolls = front.rolls.len(),
            tenors = outcomes.len(),
            failed = outcomes.values().filter(|o| o.error.is_some()).count(),
            "continuous build finished"
        );

        Ok(BuildReport {
            product: request.product.clone(),
            candidates: candidates.into_iter().map(|c| c.code).collect(),
            outcomes,
        })
    }
}

/// Splice and adjust one tenor, keeping the longest valid prefix on failure.
fn build_tenor(
    product: &str,
    schedule: &RollSchedule,
    splicer: &SeriesSplicer<'_>,
    adjuster: &PriceAdjuster,
) -> TenorOutcome {
    let mut spliced = splicer.splice(schedule);
    let mut state = match spliced.error {
        Some(Error::MissingContractData { .. }) => RollState::Failed,
        _ => schedule.final_state(),
    };
    let mut error = spliced.error.take();

    // Each failure cuts at its roll date, so the loop ends once no roll is left.
    let adjusted = loop {
        match adjuster.adjust(&spliced) {
            Ok(adjusted) => break adjusted,
            Err(err) => {
                spliced = spliced.truncated_before(err.date().unwrap_or(NaiveDate::MIN));
                state = RollState::Failed;
                error = Some(err);
            }
        }
    };

    TenorOutcome {
        series: ContinuousSeries {
            product: product.to_string(),
            tenor: schedule.tenor,
            bars: adjusted.bars,
            roll_events: spliced.roll_events,
            audit: adjusted.audit,
            gaps: schedule.gaps.clone(),
        },
        state,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{business_days, d, daily_bars, flat_source, priced_source, range_bounds, registry};
    use approx::assert_relative_eq;
    use chrono::Datelike;
    use contfut_core::{AdjustmentDirection, AdjustmentMethod, GapReason, PriceReference, RollConfig};
    use contfut_ingestion::{InMemoryBarSource, StaticSpecRegistry};

    fn range() -> DateRange {
        let (start, end) = range_bounds();
        DateRange::new(start, end).unwrap()
    }

    fn builder(source: InMemoryBarSource) -> ContinuousContractBuilder<InMemoryBarSource, StaticSpecRegistry> {
        ContinuousContractBuilder::new(source, registry())
    }

    fn unadjusted() -> AdjustmentConfig {
        AdjustmentConfig {
            method: AdjustmentMethod::None,
            direction: AdjustmentDirection::Backward,
            reference: PriceReference::Close,
        }
    }

    #[test]
    fn test_three_contract_flat_market() {
        let builder = builder(flat_source());

        let raw = builder
            .build(&BuildRequest::new("ES", range()).with_adjustment(unadjusted()))
            .unwrap();
        let raw = raw.outcome(0).unwrap();
        assert!(raw.error.is_none());
        let series = &raw.series;
        let jumps: Vec<f64> = series
            .bars
            .windows(2)
            .map(|w| w[1].close - w[0].close)
            .filter(|j| *j != 0.0)
            .collect();
        assert_eq!(jumps, vec![1.0, 2.0]);
        let roll_dates: Vec<_> = series.roll_events.iter().map(|e| e.date).collect();
        assert_eq!(roll_dates, vec![d(2024, 3, 8), d(2024, 6, 14)]);

        let report = builder.build(&BuildRequest::new("ES", range())).unwrap();
        let series = report.series(0).unwrap();
        for bar in &series.bars {
            assert_relative_eq!(bar.close, 103.0, epsilon = 1e-9);
        }
        assert_relative_eq!(series.roll_events[0].ratio.unwrap(), 1.01, epsilon = 1e-12);
        assert_relative_eq!(series.roll_events[1].ratio.unwrap(), 103.0 / 101.0, epsilon = 1e-12);
        assert_relative_eq!(series.audit.entries[0].cumulative, 1.03, epsilon = 1e-12);
        assert!(series.is_strictly_increasing());
        assert_eq!(series.bars.first().unwrap().contract, "ESH24");
        assert_eq!(series.last_bar().unwrap().contract, "ESU24");
    }

    #[test]
    fn test_ratio_adjustment_preserves_returns() {
        let price = |symbol: &str, date: NaiveDate| {
            let base = match symbol {
                "ESH24" => 5000.0,
                "ESM24" => 5050.0,
                _ => 5100.0,
            };
            base + f64::from(date.ordinal()) * 1.5
        };
        let builder = builder(priced_source(|symbol, date| Some(Some(price(symbol, date)))));
        let adjusted = builder.build(&BuildRequest::new("ES", range())).unwrap();
        let raw = builder
            .build(&BuildRequest::new("ES", range()).with_adjustment(unadjusted()))
            .unwrap();
        let adjusted = &adjusted.series(0).unwrap().bars;
        let raw = &raw.series(0).unwrap().bars;
        assert_eq!(adjusted.len(), raw.len());

        let mut rolls = 0;
        for i in 1..raw.len() {
            if raw[i].contract != raw[i - 1].contract {
                // Across a roll the adjusted series moves like the outgoing contract did that day.
                let (before, on) = (raw[i - 1].ts.date_naive(), raw[i].ts.date_naive());
                let outgoing = raw[i - 1].contract.as_str();
                let outgoing_return = price(outgoing, on) / price(outgoing, before);
                assert_relative_eq!(adjusted[i].close / adjusted[i - 1].close, outgoing_return, epsilon = 1e-12);
                assert!(outgoing_return > 1.0);
                rolls += 1;
                continue;
            }
            let raw_return = raw[i].close / raw[i - 1].close;
            let adjusted_return = adjusted[i].close / adjusted[i - 1].close;
            assert_relative_eq!(raw_return, adjusted_return, epsilon = 1e-12);
        }
        assert_eq!(rolls, 2);
    }

    #[test]
    fn test_roll_day_move_survives_adjustment() {
        // Both contracts rise 2% on the 2024-03-08 roll date.
        let roll = d(2024, 3, 8);
        let source = priced_source(|symbol, date| match symbol {
            "ESH24" if date >= roll => Some(Some(102.0)),
            "ESM24" if date >= roll => Some(Some(103.02)),
            _ => None,
        });
        let report = builder(source).build(&BuildRequest::new("ES", range())).unwrap();
        let series = report.series(0).unwrap();

        let event = &series.roll_events[0];
        assert_eq!(event.date, roll);
        assert_eq!(event.outgoing_close, 102.0);
        assert_eq!(event.incoming_price, 103.02);

        let at = series.bars.iter().position(|b| b.ts.date_naive() == roll).unwrap();
        let adjusted_return = series.bars[at].close / series.bars[at - 1].close - 1.0;
        assert_relative_eq!(adjusted_return, 0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_data_names_date_and_symbol() {
        let source = priced_source(|symbol, date| (symbol == "ESM24" && date == d(2024, 4, 10)).then_some(None));
        let report = builder(source).build(&BuildRequest::new("ES", range())).unwrap();
        let outcome = report.outcome(0).unwrap();

        assert_eq!(outcome.state, RollState::Failed);
        match &outcome.error {
            Some(Error::MissingContractData { symbol, date }) => {
                assert_eq!(symbol, "ESM24");
                assert_eq!(*date, d(2024, 4, 10));
            }
            other => panic!("unexpected {other:?}"),
        }
        let last = outcome.series.last_bar().unwrap();
        assert_eq!(last.ts.date_naive(), d(2024, 4, 9));
        // The prefix is adjusted to the last contract it reached.
        assert_relative_eq!(outcome.series.bars[0].close, 101.0, epsilon = 1e-9);
        assert_eq!(report.failed_tenors(), vec![0]);
    }

    #[test]
    fn test_failing_tenor_does_not_abort_siblings() {
        let report = builder(flat_source())
            .build(&BuildRequest::new("ES", range()).with_tenors(vec![0, 1]))
            .unwrap();

        let front = report.outcome(0).unwrap();
        assert!(front.is_complete());

        // ESZ24 has no bars when tenor 1 moves onto it at the second roll.
        let second = report.outcome(1).unwrap();
        match &second.error {
            Some(Error::MissingContractData { symbol, date }) => {
                assert_eq!(symbol, "ESZ24");
                assert_eq!(*date, d(2024, 6, 14));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(second.series.bars.first().unwrap().contract, "ESM24");
        assert_eq!(second.series.last_bar().unwrap().contract, "ESU24");
        assert_eq!(report.failed_tenors(), vec![1]);
    }

    #[test]
    fn test_raw_contracts_fetched_once_across_tenors() {
        let builder = builder(flat_source());
        let report = builder
            .build(&BuildRequest::new("ES", range()).with_tenors(vec![0, 1, 0]))
            .unwrap();
        assert_eq!(report.outcomes.len(), 2);
        // H24 through Z24 overlap the range, H25 and M25 are lookahead.
        assert_eq!(report.candidates.len(), 6);
        assert_eq!(builder.source().call_count(), report.candidates.len());
        assert_eq!(&report.candidates[..3], ["ESH24", "ESM24", "ESU24"]);
    }

    #[test]
    fn test_default_registry_builds_deep_tenors() {
        let (start, end) = (d(2024, 1, 2), d(2024, 3, 1));
        let dates = business_days(start, end);
        let mut source = InMemoryBarSource::new();
        for (symbol, level) in [
            ("ESH24", 100.0),
            ("ESM24", 101.0),
            ("ESU24", 102.0),
            ("ESZ24", 103.0),
            ("ESH25", 104.0),
        ] {
            source.insert(daily_bars(symbol, &dates, |_| level));
        }
        let builder = ContinuousContractBuilder::new(source, StaticSpecRegistry::with_defaults());
        let request = BuildRequest::new("ES", DateRange::new(start, end).unwrap()).with_tenors(vec![0, 1, 2]);
        let report = builder.build(&request).unwrap();

        for (tenor, symbol) in [(0, "ESH24"), (1, "ESM24"), (2, "ESU24")] {
            let outcome = report.outcome(tenor).unwrap();
            assert!(outcome.error.is_none(), "tenor {tenor}: {:?}", outcome.error);
            assert_eq!(outcome.series.bars.len(), 44);
            assert!(outcome.series.bars.iter().all(|b| b.contract == symbol));
        }
        assert!(report.failed_tenors().is_empty());
    }

    #[test]
    fn test_front_contract_without_data_fails() {
        let (_, end) = range_bounds();
        let dates = business_days(d(2024, 1, 2), end);
        let mut source = InMemoryBarSource::new();
        source.insert(daily_bars("ESM24", &dates, |_| 101.0));
        source.insert(daily_bars("ESU24", &dates, |_| 103.0));
        let range = DateRange::new(d(2024, 1, 2), end).unwrap();

        let report = builder(source).build(&BuildRequest::new("ES", range)).unwrap();
        let outcome = report.outcome(0).unwrap();
        assert_eq!(outcome.state, RollState::Failed);
        match &outcome.error {
            Some(Error::MissingContractData { symbol, date }) => {
                assert_eq!(symbol, "ESH24");
                assert_eq!(*date, d(2024, 1, 2));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(outcome.series.bars.is_empty());
    }

    #[test]
    fn test_no_next_contract_keeps_prefix_per_tenor() {
        // ESM24 stops trading after 2024-03-07, before the front month can roll into it.
        let source = priced_source(|symbol, date| (symbol == "ESM24" && date > d(2024, 3, 7)).then_some(None));
        let report = builder(source)
            .build(&BuildRequest::new("ES", range()).with_tenors(vec![0, 1]))
            .unwrap();

        let front = report.outcome(0).unwrap();
        assert_eq!(front.state, RollState::Failed);
        match &front.error {
            Some(Error::NoNextContract { symbol, date }) => {
                assert_eq!(symbol, "ESH24");
                assert_eq!(*date, d(2024, 3, 15));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(front.series.last_bar().unwrap().ts.date_naive(), d(2024, 3, 14));
        assert!(front.series.bars.iter().all(|b| b.contract == "ESH24"));
        let gap_dates: Vec<_> = front.series.gaps.iter().map(|g| g.date).collect();
        assert_eq!(
            gap_dates,
            vec![d(2024, 3, 8), d(2024, 3, 11), d(2024, 3, 12), d(2024, 3, 13), d(2024, 3, 14)]
        );
        assert_eq!(
            front.series.gaps[0].reason,
            GapReason::NextNotTrading { next: "ESM24".into() }
        );

        // Tenor 1 holds ESM24 and stops at its own first missing date.
        let second = report.outcome(1).unwrap();
        assert_eq!(second.state, RollState::Failed);
        match &second.error {
            Some(Error::MissingContractData { symbol, date }) => {
                assert_eq!(symbol, "ESM24");
                assert_eq!(*date, d(2024, 3, 8));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(second.series.bars.len(), 5);
        assert_eq!(second.series.last_bar().unwrap().ts.date_naive(), d(2024, 3, 7));
        assert_eq!(report.failed_tenors(), vec![0, 1]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = builder(flat_source());
        let request = BuildRequest::new("ES", range()).with_tenors(vec![0, 1]);
        let first = builder.build(&request).unwrap();
        let second = builder.build(&request).unwrap();
        for tenor in [0, 1] {
            let a = serde_json::to_string(first.series(tenor).unwrap()).unwrap();
            let b = serde_json::to_string(second.series(tenor).unwrap()).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_product_level_errors() {
        let builder = builder(flat_source());
        assert!(matches!(
            builder.build(&BuildRequest::new("XX", range())),
            Err(Error::UnknownContract(_))
        ));
        assert!(matches!(
            builder.build(&BuildRequest::new("ES", range()).with_tenors(Vec::new())),
            Err(Error::Config(_))
        ));
        let empty = ContinuousContractBuilder::new(InMemoryBarSource::new(), registry());
        assert!(matches!(empty.build(&BuildRequest::new("ES", range())), Err(Error::Data(_))));
    }

    #[test]
    fn test_request_from_json() {
        let json = r#"{
            "product": "CL",
            "tenors": [0, 1],
            "range": {"start": "2024-01-02", "end": "2024-03-28"},
            "roll": {"kind": "volume_crossover", "window": 5, "fallback_days_before_expiry": 2},
            "adjustment": {"method": "additive", "direction": "forward", "reference": "open"}
        }"#;
        let request: BuildRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.roll,
            RollStrategy::VolumeCrossover {
                window: 5,
                fallback_days_before_expiry: 2
            }
        );
        assert_eq!(request.adjustment.method, AdjustmentMethod::Additive);
        assert_eq!(request.adjustment.direction, AdjustmentDirection::Forward);
        assert_eq!(request.range.end, d(2024, 3, 28));

        let again: BuildRequest = serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
        assert_eq!(again, request);
        assert_ne!(again, request.clone().with_adjustment(AdjustmentConfig::default()));
    }

    #[test]
    fn test_requests_from_config() {
        let config = BuildConfig {
            products: vec!["ES".into(), "NQ".into()],
            tenors: vec![0, 1],
            ..BuildConfig::default()
        };
        let requests = BuildRequest::from_config(&config, range()).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].product, "NQ");
        assert_eq!(requests[0].roll, RollStrategy::Calendar { days_before_expiry: 5 });

        let ambiguous = BuildConfig {
            roll: RollConfig {
                volume_window: Some(5),
                ..RollConfig::default()
            },
            ..BuildConfig::default()
        };
        assert!(matches!(
            BuildRequest::from_config(&ambiguous, range()),
            Err(Error::AmbiguousRoll(_))
        ));
    }
}
