//! Contract symbol resolution.
//!
//! Produces the expiration-ordered candidate contracts for a product and date range.

use chrono::{Datelike, Months, NaiveDate};
use contfut_core::{ContractSpec, ContractSymbol, DateRange, Error, ExpirationRule, Result};
use serde::{Deserialize, Serialize};

/// A candidate contract with its computed calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContract {
    pub symbol: ContractSymbol,
    /// Encoded symbol (e.g., "ESH24").
    pub code: String,
    /// Last trading date.
    pub expiration: NaiveDate,
    /// First date the contract's bars are considered relevant.
    pub window_start: NaiveDate,
}

/// Resolver bound to one product spec.
pub struct ContractResolver<'a> {
    spec: &'a ContractSpec,
}

impl<'a> ContractResolver<'a> {
    /// Create a resolver for a product.
    pub fn new(spec: &'a ContractSpec) -> Self {
        Self { spec }
    }

    /// Resolve one contract month.
    pub fn contract(&self, year: i32, month: u32) -> Result<ResolvedContract> {
        let symbol = self.spec.symbol(year, month)?;
        self.resolve_symbol_parts(symbol)
    }

    /// Parse and resolve an encoded symbol.
    pub fn resolve_symbol(&self, symbol: &str, reference_year: i32) -> Result<ResolvedContract> {
        let symbol = self.spec.parse_symbol(symbol, reference_year)?;
        self.resolve_symbol_parts(symbol)
    }

    fn resolve_symbol_parts(&self, symbol: ContractSymbol) -> Result<ResolvedContract> {
        let expiration = self.spec.expiration(&symbol)?;
        let window_start = expiration
            .checked_sub_months(Months::new(self.spec.active_window_months))
            .unwrap_or(NaiveDate::MIN);
        Ok(ResolvedContract {
            code: symbol.to_string(),
            symbol,
            expiration,
            window_start,
        })
    }

    /// All contracts of the given years, ordered by expiration.
    ///
    /// An explicit expiration calendar yields only the months it lists; a
    /// rule-based spec fails on any month it cannot date.
    pub fn symbols_for_years(&self, years: &[i32]) -> Result<Vec<ResolvedContract>> {
        let explicit = matches!(self.spec.expiration, ExpirationRule::Explicit { .. });
        let mut out = Vec::with_capacity(years.len() * self.spec.months.len());
        for &year in years {
            for &month in &self.spec.months {
                match self.contract(year, month) {
                    Ok(contract) => out.push(contract),
                    Err(Error::UnknownContract(_)) if explicit => {}
                    Err(err) => return Err(err),
                }
            }
        }
        out.sort_by(|a, b| (a.expiration, &a.code).cmp(&(b.expiration, &b.code)));
        out.dedup_by(|a, b| a.code == b.code);
        Ok(out)
    }

    /// Contracts whose active window overlaps `range`, ordered by expiration,
    /// followed by `lookahead` further contracts.
    pub fn resolve(&self, range: &DateRange, lookahead: usize) -> Result<Vec<ResolvedContract>> {
        if self.spec.months.is_empty() {
            return Err(Error::unknown_contract(format!(
                "{} has no traded months",
                self.spec.product
            )));
        }

        // Expirations can precede the contract month (e.g. crude), and windows
        // reach back `active_window_months`; pad the year span on both sides.
        let per_year = self.spec.months.len();
        let extra_years = (lookahead / per_year) as i32 + 2;
        let back_years = (self.spec.active_window_months / 12) as i32 + 1;
        let years: Vec<i32> =
            (range.start.year() - 1..=range.end.year() + extra_years + back_years).collect();
        let all = self.symbols_for_years(&years)?;

        let first = all
            .iter()
            .position(|c| range.overlaps(c.window_start, c.expiration));
        let Some(first) = first else {
            return Err(Error::unknown_contract(format!(
                "no {} contracts overlap {} to {}",
                self.spec.product, range.start, range.end
            )));
        };
        let last = all
            .iter()
            .rposition(|c| range.overlaps(c.window_start, c.expiration))
            .unwrap_or(first);
        let stop = (last + 1 + lookahead).min(all.len());

        Ok(all[first..stop].to_vec())
    }
}
