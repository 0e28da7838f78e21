//! Contract specifications, month codes and symbol encoding.

use std::fmt;

use chrono::{Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{
    business_day_on_or_before, business_days_before, last_business_day_of_month,
    nth_weekday_of_month, shift_month,
};
use crate::error::{Error, Result};

/// Delivery month codes, indexed by calendar month - 1.
pub const MONTH_CODES: [char; 12] = ['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

/// Quarterly delivery months (H, M, U, Z).
pub const QUARTERLY_MONTHS: [u32; 4] = [3, 6, 9, 12];

/// Month code for a calendar month (1..=12).
pub fn month_code(month: u32) -> Option<char> {
    MONTH_CODES.get(month.checked_sub(1)? as usize).copied()
}

/// Calendar month for a month code.
pub fn month_from_code(code: char) -> Option<u32> {
    let upper = code.to_ascii_uppercase();
    MONTH_CODES
        .iter()
        .position(|&c| c == upper)
        .map(|i| i as u32 + 1)
}

/// A specific expiring contract, e.g. `ESH24`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawContractSymbol")]
pub struct ContractSymbol {
    /// Product code (e.g., "ES").
    pub product: String,
    /// Contract year.
    pub year: i32,
    /// Contract month (1..=12).
    pub month: u32,
    /// Number of year digits used when encoding.
    pub year_digits: u8,
}

/// Unvalidated wire form of [`ContractSymbol`].
#[derive(Deserialize)]
struct RawContractSymbol {
    product: String,
    year: i32,
    month: u32,
    year_digits: u8,
}

impl TryFrom<RawContractSymbol> for ContractSymbol {
    type Error = Error;

    fn try_from(raw: RawContractSymbol) -> Result<Self> {
        ContractSymbol::new(raw.product, raw.year, raw.month, raw.year_digits)
    }
}

impl ContractSymbol {
    /// Create a symbol, validating the month.
    pub fn new(product: impl Into<String>, year: i32, month: u32, year_digits: u8) -> Result<Self> {
        let product = product.into();
        if month_code(month).is_none() {
            return Err(Error::unknown_contract(format!(
                "{product}: month {month} has no month code"
            )));
        }
        Ok(Self {
            product,
            year,
            month,
            year_digits,
        })
    }

    /// Month code letter, `?` for a month outside 1..=12.
    pub fn code(&self) -> char {
        month_code(self.month).unwrap_or('?')
    }

    /// Parse a symbol such as `ESH24`, `ESH4` or `ESH2024`.
    ///
    /// One and two digit years resolve to the matching year nearest `reference_year`.
    pub fn parse(symbol: &str, reference_year: i32) -> Result<Self> {
        let digits = symbol
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if !matches!(digits, 1 | 2 | 4) || symbol.len() < digits + 2 || !symbol.is_ascii() {
            return Err(Error::unknown_contract(format!("malformed symbol {symbol:?}")));
        }

        let split = symbol.len() - digits;
        let (head, year_str) = symbol.split_at(split);
        let (product, code) = head.split_at(head.len() - 1);
        let code = code.chars().next().unwrap_or(' ');
        let month = month_from_code(code)
            .ok_or_else(|| Error::unknown_contract(format!("unknown month code {code:?} in {symbol}")))?;

        let raw: i32 = year_str
            .parse()
            .map_err(|_| Error::unknown_contract(format!("bad year in {symbol}")))?;
        let year = if digits == 4 {
            raw
        } else {
            nearest_year(raw, 10_i32.pow(digits as u32), reference_year)
        };

        Ok(Self {
            product: product.to_string(),
            year,
            month,
            year_digits: digits as u8,
        })
    }
}

fn nearest_year(suffix: i32, modulus: i32, reference_year: i32) -> i32 {
    let base = reference_year - reference_year.rem_euclid(modulus) + suffix;
    [base - modulus, base, base + modulus]
        .into_iter()
        .min_by_key(|y| ((y - reference_year).abs(), *y))
        .unwrap_or(base)
}

impl fmt::Display for ContractSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modulus = 10_i32.pow(u32::from(self.year_digits.min(4)));
        let width = self.year_digits as usize;
        write!(
            f,
            "{}{}{:0width$}",
            self.product,
            self.code(),
            self.year.rem_euclid(modulus),
            width = width
        )
    }
}

/// Explicit expiration for one contract month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplicitExpiry {
    pub year: i32,
    pub month: u32,
    pub expiration: NaiveDate,
}

/// Rule computing a contract's last trading date from its year/month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpirationRule {
    /// Nth weekday of the (offset) month, e.g. third Friday.
    NthWeekday {
        n: u8,
        weekday: Weekday,
        month_offset: i32,
    },
    /// `business_days` before `day` of the (offset) month.
    ///
    /// If `day` is not a business day, counting starts from the business day before it.
    BusinessDaysBefore {
        day: u32,
        business_days: u32,
        month_offset: i32,
    },
    /// `offset` business days before the last business day of the (offset) month.
    LastBusinessDay { offset: u32, month_offset: i32 },
    /// Exchange-published dates.
    Explicit { dates: Vec<ExplicitExpiry> },
}

impl ExpirationRule {
    /// Third Friday of the contract month (equity index futures).
    pub fn third_friday() -> Self {
        ExpirationRule::NthWeekday {
            n: 3,
            weekday: Weekday::Fri,
            month_offset: 0,
        }
    }

    /// Compute the expiration date for a contract year/month.
    pub fn expiration(&self, year: i32, month: u32) -> Option<NaiveDate> {
        match self {
            ExpirationRule::NthWeekday {
                n,
                weekday,
                month_offset,
            } => {
                let (y, m) = shift_month(year, month, *month_offset);
                nth_weekday_of_month(y, m, *weekday, *n)
            }
            ExpirationRule::BusinessDaysBefore {
                day,
                business_days,
                month_offset,
            } => {
                let (y, m) = shift_month(year, month, *month_offset);
                let anchor = NaiveDate::from_ymd_opt(y, m, *day)?;
                let anchor = if crate::calendar::is_business_day(anchor) {
                    anchor
                } else {
                    business_day_on_or_before(anchor - Duration::days(1))
                };
                Some(business_days_before(anchor, *business_days))
            }
            ExpirationRule::LastBusinessDay {
                offset,
                month_offset,
            } => {
                let (y, m) = shift_month(year, month, *month_offset);
                last_business_day_of_month(y, m).map(|d| business_days_before(d, *offset))
            }
            ExpirationRule::Explicit { dates } => dates
                .iter()
                .find(|e| e.year == year && e.month == month)
                .map(|e| e.expiration),
        }
    }
}

/// Static description of a futures product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Product code (e.g., "ES").
    pub product: String,
    /// Delivery months traded, ascending (1..=12).
    pub months: Vec<u32>,
    /// Expiration rule.
    pub expiration: ExpirationRule,
    /// Tick size (minimum price increment).
    pub tick_size: f64,
    /// Contract multiplier.
    pub multiplier: f64,
    /// Year digits in encoded symbols.
    #[serde(default = "default_year_digits")]
    pub year_digits: u8,
    /// Months before expiration during which the contract's bars are relevant.
    #[serde(default = "default_active_window_months")]
    pub active_window_months: u32,
    /// Hours added to a UTC bar timestamp to obtain its trading date.
    #[serde(default)]
    pub session_offset_hours: i64,
}

fn default_year_digits() -> u8 {
    2
}

fn default_active_window_months() -> u32 {
    6
}

impl ContractSpec {
    /// Create a spec with default symbol encoding and windows.
    pub fn new(
        product: impl Into<String>,
        months: Vec<u32>,
        expiration: ExpirationRule,
        tick_size: f64,
        multiplier: f64,
    ) -> Self {
        let mut months = months;
        months.sort_unstable();
        months.dedup();
        Self {
            product: product.into(),
            months,
            expiration,
            tick_size,
            multiplier,
            year_digits: default_year_digits(),
            active_window_months: default_active_window_months(),
            session_offset_hours: 0,
        }
    }

    /// Override the active window.
    pub fn with_active_window(mut self, months: u32) -> Self {
        self.active_window_months = months;
        self
    }

    /// Override the session offset.
    pub fn with_session_offset(mut self, hours: i64) -> Self {
        self.session_offset_hours = hours;
        self
    }

    /// Does the product trade every calendar month?
    pub fn is_monthly(&self) -> bool {
        self.months.len() == 12
    }

    /// Does the product trade only H/M/U/Z?
    pub fn is_quarterly(&self) -> bool {
        self.months == QUARTERLY_MONTHS
    }

    /// Build a symbol for a contract month, rejecting months the product does not trade.
    pub fn symbol(&self, year: i32, month: u32) -> Result<ContractSymbol> {
        if !self.months.contains(&month) {
            return Err(Error::unknown_contract(format!(
                "{} does not trade month {month}",
                self.product
            )));
        }
        ContractSymbol::new(self.product.clone(), year, month, self.year_digits)
    }

    /// Parse and validate a symbol against this product.
    pub fn parse_symbol(&self, symbol: &str, reference_year: i32) -> Result<ContractSymbol> {
        let parsed = ContractSymbol::parse(symbol, reference_year)?;
        if parsed.product != self.product {
            return Err(Error::unknown_contract(format!(
                "{symbol} is not a {} contract",
                self.product
            )));
        }
        self.symbol(parsed.year, parsed.month)
    }

    /// Expiration date of a contract.
    pub fn expiration(&self, symbol: &ContractSymbol) -> Result<NaiveDate> {
        self.expiration
            .expiration(symbol.year, symbol.month)
            .ok_or_else(|| Error::unknown_contract(format!("no expiration for {symbol}")))
    }

    /// Trading date of a UTC timestamp for this product.
    pub fn trading_date(&self, ts: chrono::DateTime<chrono::Utc>) -> NaiveDate {
        (ts + Duration::hours(self.session_offset_hours)).date_naive()
    }
}
