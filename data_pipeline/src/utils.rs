// src/utils.rs

use chrono::{Months, NaiveDate};

/// Rounds to a fixed number of decimal places, ties to even, dropping
/// non-finite values.
pub fn round_to(value: f64, decimals: i32) -> Option<f64> {
    let factor = 10f64.powi(decimals);
    finite((value * factor).round_ties_even() / factor)
}

pub fn finite(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Same calendar day one year earlier (Feb 29 falls back to Feb 28).
pub fn one_year_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(12)).unwrap_or(date)
}
