//! Business-day calendar helpers.
//!
//! Business days are Monday through Friday. Exchange holidays are not modelled.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Is the date a business day?
#[inline]
pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Count business days in `(from, to]`.
///
/// Returns 0 when `to <= from`.
pub fn business_days_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    from.iter_days()
        .skip(1)
        .take_while(|d| *d <= to)
        .filter(|d| is_business_day(*d))
        .count() as u32
}

/// Step back `n` business days from `date`.
pub fn business_days_before(date: NaiveDate, n: u32) -> NaiveDate {
    let mut current = date;
    let mut remaining = n;
    while remaining > 0 {
        current -= Duration::days(1);
        if is_business_day(current) {
            remaining -= 1;
        }
    }
    current
}

/// Latest business day on or before `date`.
pub fn business_day_on_or_before(date: NaiveDate) -> NaiveDate {
    let mut current = date;
    while !is_business_day(current) {
        current -= Duration::days(1);
    }
    current
}

/// Shift a (year, month) pair by `offset` months.
pub fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let zero_based = year * 12 + month as i32 - 1 + offset;
    (zero_based.div_euclid(12), (zero_based.rem_euclid(12) + 1) as u32)
}

/// Nth occurrence of a weekday in a month (n starts at 1).
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

/// Last calendar day of a month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = shift_month(year, month, 1);
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

/// Last business day of a month.
pub fn last_business_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    last_day_of_month(year, month).map(business_day_on_or_before)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_business_days_between_skips_weekend() {
        // Fri 2024-03-08 -> Fri 2024-03-15: Mon..Fri = 5
        assert_eq!(business_days_between(d(2024, 3, 8), d(2024, 3, 15)), 5);
        // Sat -> Mon counts only Monday
        assert_eq!(business_days_between(d(2024, 3, 9), d(2024, 3, 11)), 1);
        assert_eq!(business_days_between(d(2024, 3, 15), d(2024, 3, 15)), 0);
        assert_eq!(business_days_between(d(2024, 3, 16), d(2024, 3, 15)), 0);
    }

    #[test]
    fn test_business_days_before() {
        // 5 business days before Fri 2024-03-15 is Fri 2024-03-08
        assert_eq!(business_days_before(d(2024, 3, 15), 5), d(2024, 3, 8));
        // 1 business day before Monday is the previous Friday
        assert_eq!(business_days_before(d(2024, 3, 11), 1), d(2024, 3, 8));
    }

    #[test]
    fn test_shift_month_wraps_years() {
        assert_eq!(shift_month(2024, 1, -1), (2023, 12));
        assert_eq!(shift_month(2024, 12, 1), (2025, 1));
        assert_eq!(shift_month(2024, 6, -18), (2022, 12));
    }

    #[test]
    fn test_third_friday() {
        assert_eq!(nth_weekday_of_month(2025, 3, Weekday::Fri, 3), Some(d(2025, 3, 21)));
        assert_eq!(nth_weekday_of_month(2024, 6, Weekday::Fri, 3), Some(d(2024, 6, 21)));
    }

    #[test]
    fn test_last_business_day() {
        // 2024-03-31 is a Sunday
        assert_eq!(last_business_day_of_month(2024, 3), Some(d(2024, 3, 29)));
        assert_eq!(last_day_of_month(2024, 2), Some(d(2024, 2, 29)));
    }
}
