// src/fundamentals.rs

use crate::models::FundamentalsRecord;
use crate::provider::{InfoPayload, MarketDataProvider};
use crate::utils::round_to;
use tracing::{info, warn};

/// Used when the provider has no sector for a ticker.
pub const DEFAULT_SECTOR: &str = "Industrials";

/// One record per ticker, in input order. A failed lookup yields a stub
/// record instead of aborting the batch.
pub fn fetch_fundamentals<P>(provider: &P, tickers: &[String]) -> Vec<FundamentalsRecord>
where
    P: MarketDataProvider + ?Sized,
{
    info!("Fetching fundamental data...");

    tickers
        .iter()
        .map(|ticker| match provider.info(ticker) {
            Ok(payload) => fundamentals_from_info(ticker, &payload),
            Err(e) => {
                warn!("Error fetching fundamentals for {}: {}", ticker, e);
                FundamentalsRecord::stub(ticker)
            }
        })
        .collect()
}

pub fn fundamentals_from_info(ticker: &str, info: &InfoPayload) -> FundamentalsRecord {
    FundamentalsRecord {
        ticker: ticker.to_string(),
        company: Some(info.short_name().unwrap_or(ticker).to_string()),
        sector: Some(info.sector().unwrap_or(DEFAULT_SECTOR).to_string()),
        market_cap_b: info
            .market_cap()
            .filter(|cap| *cap != 0.0)
            .and_then(|cap| round_to(cap / 1e9, 2)),
        pe_ratio: info.trailing_pe(),
        ev_ebitda: info.enterprise_to_ebitda(),
        ebitda_margin: ebitda_margin(info).and_then(|m| round_to(m, 1)),
        rev_growth: info
            .revenue_growth()
            .filter(|growth| *growth != 0.0)
            .and_then(|growth| round_to(growth * 100.0, 1)),
    }
}

// EBITDA over revenue, falling back to the provider's profit margin
fn ebitda_margin(info: &InfoPayload) -> Option<f64> {
    match (info.ebitda(), info.total_revenue()) {
        (Some(ebitda), Some(revenue)) if revenue > 0.0 => Some(ebitda / revenue * 100.0),
        _ => info.profit_margins().map(|margin| margin * 100.0),
    }
}
