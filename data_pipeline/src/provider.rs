// src/provider.rs

use crate::error::ProviderError;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type ClosePoints = Vec<(NaiveDate, Option<f64>)>;

/// Raw download shape. Single-symbol downloads come back without a
/// per-symbol grouping level.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceFrame {
    Flat(ClosePoints),
    Grouped(BTreeMap<String, ClosePoints>),
}

/// Upstream market data source.
pub trait MarketDataProvider {
    /// Adjusted daily closes for `tickers` between `start` and `end` inclusive.
    fn download_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceFrame, ProviderError>;

    /// Company metadata and valuation ratios for one ticker.
    fn info(&self, ticker: &str) -> Result<InfoPayload, ProviderError>;
}

/// The fields of the provider's loosely-typed info payload that the
/// dashboard uses. Every field is optional upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoPayload {
    market_cap: Option<f64>,
    total_revenue: Option<f64>,
    ebitda: Option<f64>,
    profit_margins: Option<f64>,
    short_name: Option<String>,
    sector: Option<String>,
    trailing_pe: Option<f64>,
    enterprise_to_ebitda: Option<f64>,
    revenue_growth: Option<f64>,
}

impl InfoPayload {
    /// Builds the payload from a flat key-value map. Values of the wrong
    /// type are treated as absent rather than failing the whole payload.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let number = |key: &str| map.get(key).and_then(as_number);
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        InfoPayload {
            market_cap: number("marketCap"),
            total_revenue: number("totalRevenue"),
            ebitda: number("ebitda"),
            profit_margins: number("profitMargins"),
            short_name: text("shortName"),
            sector: text("sector"),
            trailing_pe: number("trailingPE"),
            enterprise_to_ebitda: number("enterpriseToEbitda"),
            revenue_growth: number("revenueGrowth"),
        }
    }

    pub fn with_market_cap(mut self, value: f64) -> Self {
        self.market_cap = Some(value);
        self
    }

    pub fn with_total_revenue(mut self, value: f64) -> Self {
        self.total_revenue = Some(value);
        self
    }

    pub fn with_ebitda(mut self, value: f64) -> Self {
        self.ebitda = Some(value);
        self
    }

    pub fn with_profit_margins(mut self, value: f64) -> Self {
        self.profit_margins = Some(value);
        self
    }

    pub fn with_short_name(mut self, value: &str) -> Self {
        self.short_name = Some(value.to_string());
        self
    }

    pub fn with_sector(mut self, value: &str) -> Self {
        self.sector = Some(value.to_string());
        self
    }

    pub fn with_trailing_pe(mut self, value: f64) -> Self {
        self.trailing_pe = Some(value);
        self
    }

    pub fn with_enterprise_to_ebitda(mut self, value: f64) -> Self {
        self.enterprise_to_ebitda = Some(value);
        self
    }

    pub fn with_revenue_growth(mut self, value: f64) -> Self {
        self.revenue_growth = Some(value);
        self
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.market_cap
    }

    pub fn total_revenue(&self) -> Option<f64> {
        self.total_revenue
    }

    pub fn ebitda(&self) -> Option<f64> {
        self.ebitda
    }

    pub fn profit_margins(&self) -> Option<f64> {
        self.profit_margins
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn sector(&self) -> Option<&str> {
        self.sector.as_deref()
    }

    pub fn trailing_pe(&self) -> Option<f64> {
        self.trailing_pe
    }

    pub fn enterprise_to_ebitda(&self) -> Option<f64> {
        self.enterprise_to_ebitda
    }

    pub fn revenue_growth(&self) -> Option<f64> {
        self.revenue_growth
    }
}

fn as_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}
