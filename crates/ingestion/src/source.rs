//! Capability interfaces for the external raw bar source and spec registry.
//!
//! The core never talks to a vendor or storage layer directly; callers pass
//! implementations of these traits into the builder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use contfut_core::contract::QUARTERLY_MONTHS;
use contfut_core::{ContractSpec, Error, ExpirationRule, RawContractBar, Result};

/// Source of raw per-contract bars.
///
/// Implementations must return bars sorted by timestamp ascending with no
/// duplicate timestamps. Retry and timeout policy belongs to the implementation.
pub trait RawBarSource: Send + Sync {
    /// Bars for one contract whose UTC date lies in `[start, end]`.
    fn get_bars(
        &self,
        product: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawContractBar>>;
}

impl<T: RawBarSource + ?Sized> RawBarSource for Arc<T> {
    fn get_bars(
        &self,
        product: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawContractBar>> {
        (**self).get_bars(product, symbol, start, end)
    }
}

/// Registry of product specifications.
pub trait SpecRegistry: Send + Sync {
    /// Spec for a product, or `UnknownContract`.
    fn get_spec(&self, product: &str) -> Result<Arc<ContractSpec>>;
}

impl<T: SpecRegistry + ?Sized> SpecRegistry for Arc<T> {
    fn get_spec(&self, product: &str) -> Result<Arc<ContractSpec>> {
        (**self).get_spec(product)
    }
}

/// In-memory bar source keyed by contract symbol.
#[derive(Debug, Default)]
pub struct InMemoryBarSource {
    bars: HashMap<String, Vec<RawContractBar>>,
    /// Number of `get_bars` calls served.
    calls: AtomicUsize,
}

impl InMemoryBarSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bars for their owning symbols, keeping the given order.
    pub fn insert(&mut self, bars: impl IntoIterator<Item = RawContractBar>) {
        for bar in bars {
            self.bars.entry(bar.symbol.clone()).or_default().push(bar);
        }
    }

    /// Number of fetches served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl RawBarSource for InMemoryBarSource {
    fn get_bars(
        &self,
        _product: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawContractBar>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .bars
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| {
                        let date = b.ts.date_naive();
                        date >= start && date <= end
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Registry backed by a fixed map of specs.
#[derive(Debug, Default, Clone)]
pub struct StaticSpecRegistry {
    specs: HashMap<String, Arc<ContractSpec>>,
}

impl StaticSpecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with common CME/NYMEX/COMEX products.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(ContractSpec::new(
            "ES",
            QUARTERLY_MONTHS.to_vec(),
            ExpirationRule::third_friday(),
            0.25,
            50.0,
        ));
        registry.insert(ContractSpec::new(
            "NQ",
            QUARTERLY_MONTHS.to_vec(),
            ExpirationRule::third_friday(),
            0.25,
            20.0,
        ));
        registry.insert(
            ContractSpec::new(
                "CL",
                (1..=12).collect(),
                ExpirationRule::BusinessDaysBefore {
                    day: 25,
                    business_days: 3,
                    month_offset: -1,
                },
                0.01,
                1000.0,
            )
            .with_active_window(2),
        );
        registry.insert(ContractSpec::new(
            "GC",
            vec![2, 4, 6, 8, 10, 12],
            ExpirationRule::LastBusinessDay {
                offset: 2,
                month_offset: 0,
            },
            0.1,
            100.0,
        ));
        registry.insert(
            ContractSpec::new(
                "ZN",
                QUARTERLY_MONTHS.to_vec(),
                ExpirationRule::LastBusinessDay {
                    offset: 7,
                    month_offset: 0,
                },
                1.0 / 64.0,
                1000.0,
            )
            .with_active_window(4),
        );
        registry.insert(ContractSpec::new(
            "6E",
            QUARTERLY_MONTHS.to_vec(),
            ExpirationRule::NthWeekday {
                n: 3,
                weekday: Weekday::Wed,
                month_offset: 0,
            },
            0.00005,
            125_000.0,
        ));
        registry
    }

    /// Register or replace a spec.
    pub fn insert(&mut self, spec: ContractSpec) {
        self.specs.insert(spec.product.clone(), Arc::new(spec));
    }
}

impl SpecRegistry for StaticSpecRegistry {
    fn get_spec(&self, product: &str) -> Result<Arc<ContractSpec>> {
        self.specs
            .get(product)
            .cloned()
            .ok_or_else(|| Error::unknown_contract(format!("unknown product {product:?}")))
    }
}
