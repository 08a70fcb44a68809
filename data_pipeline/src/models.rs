// src/models.rs

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

pub type Ticker = String;

// Cleaned closing prices for one ticker, ascending by date
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: Ticker,
    pub points: Vec<(NaiveDate, f64)>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<(NaiveDate, f64)> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.points.last().copied()
    }
}

/// Wide date x ticker table of closing prices.
///
/// Columns keep the order they were added in. A date missing for one ticker
/// but present for another is stored as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: Vec<(Ticker, Vec<Option<f64>>)>,
}

impl PriceTable {
    pub fn new() -> Self {
        PriceTable::default()
    }

    /// Aligns per-ticker observations on the union of their dates.
    /// Duplicate dates within one column keep the last value.
    pub fn from_columns(columns: Vec<(Ticker, Vec<(NaiveDate, Option<f64>)>)>) -> Self {
        let dates: BTreeSet<NaiveDate> = columns
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(date, _)| *date))
            .collect();
        let dates: Vec<NaiveDate> = dates.into_iter().collect();

        let columns = columns
            .into_iter()
            .map(|(ticker, points)| {
                let by_date: BTreeMap<NaiveDate, Option<f64>> = points
                    .into_iter()
                    .map(|(date, value)| (date, value.filter(|v| v.is_finite())))
                    .collect();
                let values = dates
                    .iter()
                    .map(|date| by_date.get(date).copied().flatten())
                    .collect();
                (ticker, values)
            })
            .collect();

        PriceTable { dates, columns }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.columns.iter().map(|(ticker, _)| ticker.as_str()).collect()
    }

    pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(name, _)| name == ticker)
            .map(|(_, values)| values.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.dates.is_empty()
    }

    /// Carries the last known price forward across gaps, per ticker.
    pub fn forward_fill(&mut self) {
        for (_, values) in self.columns.iter_mut() {
            let mut last = None;
            for value in values.iter_mut() {
                match value {
                    Some(v) => last = Some(*v),
                    None => *value = last,
                }
            }
        }
    }

    /// Removes dates on which every ticker is missing.
    pub fn drop_empty_rows(&mut self) {
        let keep: Vec<bool> = (0..self.dates.len())
            .map(|row| self.columns.iter().any(|(_, values)| values[row].is_some()))
            .collect();

        let mut row = 0;
        self.dates.retain(|_| {
            row += 1;
            keep[row - 1]
        });
        for (_, values) in self.columns.iter_mut() {
            let mut row = 0;
            values.retain(|_| {
                row += 1;
                keep[row - 1]
            });
        }
    }

    /// Rows strictly after `cutoff`.
    pub fn after(&self, cutoff: NaiveDate) -> PriceTable {
        let start = self.dates.partition_point(|date| *date <= cutoff);
        PriceTable {
            dates: self.dates[start..].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(ticker, values)| (ticker.clone(), values[start..].to_vec()))
                .collect(),
        }
    }

    /// The ticker's observations with its own missing entries dropped.
    pub fn series(&self, ticker: &str) -> Option<PriceSeries> {
        let values = self.column(ticker)?;
        let points = self
            .dates
            .iter()
            .zip(values.iter())
            .filter_map(|(date, value)| value.map(|v| (*date, v)))
            .collect();
        Some(PriceSeries { ticker: ticker.to_string(), points })
    }

    pub fn history_records(&self) -> Vec<HistoryRecord> {
        self.dates
            .iter()
            .enumerate()
            .map(|(row, date)| HistoryRecord {
                date: *date,
                prices: self
                    .columns
                    .iter()
                    .map(|(ticker, values)| (ticker.clone(), values[row]))
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRecord {
    pub ticker: Ticker,
    pub price: Option<f64>,
    pub return_1y: Option<f64>,
    pub cagr_3y: Option<f64>,
}

// Field names are the dashboard's column headers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    #[serde(rename = "Ticker")]
    pub ticker: Ticker,
    #[serde(rename = "Company")]
    pub company: Option<String>,
    #[serde(rename = "Sector")]
    pub sector: Option<String>,
    #[serde(rename = "Market Cap (B)")]
    pub market_cap_b: Option<f64>,
    #[serde(rename = "PE Ratio")]
    pub pe_ratio: Option<f64>,
    #[serde(rename = "EV/EBITDA")]
    pub ev_ebitda: Option<f64>,
    #[serde(rename = "EBITDA Margin")]
    pub ebitda_margin: Option<f64>,
    #[serde(rename = "Rev Growth")]
    pub rev_growth: Option<f64>,
}

impl FundamentalsRecord {
    /// Placeholder for a ticker whose info lookup failed.
    pub fn stub(ticker: &str) -> Self {
        FundamentalsRecord {
            ticker: ticker.to_string(),
            company: Some(ticker.to_string()),
            sector: None,
            market_cap_b: None,
            pe_ratio: None,
            ev_ebitda: None,
            ebitda_margin: None,
            rev_growth: None,
        }
    }
}

// Fundamentals left-joined with performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRecord {
    #[serde(flatten)]
    pub fundamentals: FundamentalsRecord,
    #[serde(rename = "Price")]
    pub price: Option<f64>,
    #[serde(rename = "1Y Return")]
    pub return_1y: Option<f64>,
    #[serde(rename = "3Y CAGR")]
    pub cagr_3y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub prices: Vec<(Ticker, Option<f64>)>,
}

// {"Date": "YYYY-MM-DD", "<ticker>": price | null, ...} in column order
impl Serialize for HistoryRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.prices.len() + 1))?;
        map.serialize_entry("Date", &self.date.format("%Y-%m-%d").to_string())?;
        for (ticker, price) in &self.prices {
            map.serialize_entry(ticker, &price.filter(|p| p.is_finite()))?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineResult {
    pub fundamentals: Vec<DashboardRecord>,
    pub history: Vec<HistoryRecord>,
}

impl PipelineResult {
    pub fn empty() -> Self {
        PipelineResult::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fundamentals.is_empty()
    }
}
