// src/performance.rs

use crate::models::{PerformanceRecord, PriceSeries, PriceTable};
use crate::utils::{finite, round_to};

/// Trading days in a year.
pub const TRADING_DAYS: usize = 252;

const MIN_CAGR_YEARS: f64 = 0.5;

/// Compound annual growth rate as a fraction, or `None` when the start
/// price or elapsed years are missing or non-positive.
pub fn calculate_cagr(start_price: Option<f64>, end_price: f64, years: Option<f64>) -> Option<f64> {
    let start_price = start_price.filter(|p| *p > 0.0)?;
    let years = years.filter(|y| *y > 0.0)?;
    finite((end_price / start_price).powf(1.0 / years) - 1.0)
}

/// One record per ticker that has at least one price. Each ticker is cleaned
/// independently of the others.
pub fn performance_metrics(prices: &PriceTable) -> Vec<PerformanceRecord> {
    prices
        .tickers()
        .into_iter()
        .filter_map(|ticker| prices.series(ticker))
        .filter_map(|series| series_metrics(&series))
        .collect()
}

pub fn series_metrics(series: &PriceSeries) -> Option<PerformanceRecord> {
    let (last_date, current) = series.last()?;
    let (first_date, first_price) = series.first()?;

    // Price a year of trading days back, or the oldest available
    let reference_idx = if series.len() >= TRADING_DAYS {
        series.len() - TRADING_DAYS
    } else {
        0
    };
    let return_1y = series
        .points
        .get(reference_idx)
        .map(|(_, price)| *price)
        .filter(|price| *price > 0.0)
        .and_then(|price| finite((current - price) / price));

    let years = (last_date - first_date).num_days() as f64 / 365.25;
    let cagr = if years > MIN_CAGR_YEARS {
        calculate_cagr(Some(first_price), current, Some(years))
    } else {
        None
    };

    Some(PerformanceRecord {
        ticker: series.ticker.clone(),
        price: round_to(current, 2),
        return_1y: return_1y.and_then(|r| round_to(r * 100.0, 2)),
        cagr_3y: cagr.and_then(|c| round_to(c * 100.0, 2)),
    })
}
