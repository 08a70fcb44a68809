// src/yahoo.rs

use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::provider::{ClosePoints, InfoPayload, MarketDataProvider, PriceFrame};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// Merged in this order; the first module that carries a key wins
const SUMMARY_MODULES: [&str; 5] = [
    "price",
    "summaryProfile",
    "summaryDetail",
    "financialData",
    "defaultKeyStatistics",
];

// Chart API structure
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    // Seconds east of UTC for the listing exchange
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

// quoteSummary API structure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

/// Yahoo Finance over blocking HTTP.
///
/// quoteSummary only answers requests that carry a crumb issued for the
/// client's session cookie. The crumb is fetched on first use and refreshed
/// once if Yahoo rejects it.
pub struct YahooProvider {
    client: Client,
    chart_url: String,
    summary_url: String,
    cookie_url: String,
    crumb_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooProvider {
    pub fn new(config: &PipelineConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;

        Ok(YahooProvider {
            client,
            chart_url: config.chart_url.trim_end_matches('/').to_string(),
            summary_url: config.summary_url.trim_end_matches('/').to_string(),
            cookie_url: config.cookie_url.clone(),
            crumb_url: config.crumb_url.clone(),
            crumb: Mutex::new(None),
        })
    }

    pub fn fetch_chart(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<ClosePoints, ProviderError> {
        let period1 = midnight_utc(start);
        // End date is inclusive
        let period2 = midnight_utc(end + Duration::days(1));

        debug!("Requesting chart for {} ({} - {})", ticker, start, end);
        let response = self
            .client
            .get(format!("{}/{}", self.chart_url, ticker))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,splits".to_string()),
            ])
            .send()?;

        let (status, body) = read_body(response)?;
        parse_chart(ticker, status, &body)
    }

    pub fn fetch_summary(&self, ticker: &str) -> Result<InfoPayload, ProviderError> {
        match self.request_summary(ticker) {
            Err(ProviderError::Status { status: 401, .. }) => {
                debug!("Crumb rejected for {}, starting a new session", ticker);
                self.forget_crumb();
                self.request_summary(ticker)
            }
            other => other,
        }
    }

    fn request_summary(&self, ticker: &str) -> Result<InfoPayload, ProviderError> {
        let crumb = self.crumb()?;
        let response = self
            .client
            .get(format!("{}/{}", self.summary_url, ticker))
            .query(&[("modules", SUMMARY_MODULES.join(",")), ("crumb", crumb)])
            .send()?;

        let (status, body) = read_body(response)?;
        parse_summary(ticker, status, &body)
    }

    fn crumb(&self) -> Result<String, ProviderError> {
        let mut cached = self.crumb.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb()?;
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    fn forget_crumb(&self) {
        *self.crumb.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn fetch_crumb(&self) -> Result<String, ProviderError> {
        // Answers 404 but still sets the session cookie
        if let Err(e) = self.client.get(&self.cookie_url).send() {
            debug!("Session cookie request failed: {}", e);
        }

        let response = self.client.get(&self.crumb_url).send()?;
        let (status, body) = read_body(response)?;
        parse_crumb(status, &body)
    }
}

impl MarketDataProvider for YahooProvider {
    fn download_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceFrame, ProviderError> {
        if let [ticker] = tickers {
            return self.fetch_chart(ticker, start, end).map(PriceFrame::Flat);
        }

        let mut groups = BTreeMap::new();
        let mut last_error = None;
        for ticker in tickers {
            match self.fetch_chart(ticker, start, end) {
                Ok(points) => {
                    groups.insert(ticker.clone(), points);
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", ticker, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if groups.is_empty() => Err(e),
            _ => Ok(PriceFrame::Grouped(groups)),
        }
    }

    fn info(&self, ticker: &str) -> Result<InfoPayload, ProviderError> {
        self.fetch_summary(ticker)
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)).timestamp()
}

fn read_body(response: Response) -> Result<(u16, String), ProviderError> {
    let status = response.status().as_u16();
    let body = response.text()?;
    Ok((status, body))
}

fn parse_chart(ticker: &str, status: u16, body: &str) -> Result<ClosePoints, ProviderError> {
    let envelope: ChartEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return Err(ProviderError::Status { ticker: ticker.to_string(), status })
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(error) = envelope.chart.error {
        return Err(upstream(ticker, error));
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ProviderError::NoData(ticker.to_string()))?;

    // Adjusted closes when present, raw closes otherwise
    let closes = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|block| block.adjclose)
        .filter(|closes| !closes.is_empty())
        .or_else(|| result.indicators.quote.into_iter().next().map(|block| block.close))
        .unwrap_or_default();

    let offset = result.meta.gmtoffset;
    Ok(result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            DateTime::from_timestamp(ts + offset, 0).map(|dt| (dt.date_naive(), close))
        })
        .collect())
}

fn parse_crumb(status: u16, body: &str) -> Result<String, ProviderError> {
    let crumb = body.trim();
    // Rate limiting and consent pages come back as text or HTML
    let looks_valid = !crumb.is_empty() && !crumb.contains(char::is_whitespace) && !crumb.contains('<');
    if !(200..300).contains(&status) || !looks_valid {
        return Err(ProviderError::Crumb(status));
    }
    Ok(crumb.to_string())
}

fn parse_summary(ticker: &str, status: u16, body: &str) -> Result<InfoPayload, ProviderError> {
    let envelope: SummaryEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return Err(ProviderError::Status { ticker: ticker.to_string(), status })
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(error) = envelope.quote_summary.error {
        return Err(upstream(ticker, error));
    }

    let modules = envelope
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ProviderError::NoData(ticker.to_string()))?;

    Ok(InfoPayload::from_map(&flatten_modules(&modules)))
}

/// Merges the summary modules into one flat map and unwraps Yahoo's
/// `{"raw": .., "fmt": ..}` number wrappers.
fn flatten_modules(modules: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for module in SUMMARY_MODULES {
        let Some(fields) = modules.get(module).and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in fields {
            if flat.contains_key(key) {
                continue;
            }
            let value = match value {
                Value::Object(wrapper) => match wrapper.get("raw") {
                    Some(raw) => raw.clone(),
                    None => continue,
                },
                other => other.clone(),
            };
            if !value.is_null() {
                flat.insert(key.clone(), value);
            }
        }
    }
    flat
}

fn upstream(ticker: &str, error: YahooError) -> ProviderError {
    ProviderError::Upstream {
        ticker: ticker.to_string(),
        message: format!("{}: {}", error.code, error.description),
    }
}
