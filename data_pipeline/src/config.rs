// src/config.rs

use crate::cache::{provider_cache_dir, DEFAULT_CACHE_NAME};
use crate::error::{PipelineError, Result};
use std::path::PathBuf;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// The Helsinki-listed names the dashboard is built around.
pub const TICKERS: [&str; 5] = ["NESTE.HE", "FORTUM.HE", "WRT1V.HE", "KEMPOWR.HE", "VALMT.HE"];

pub const FUNDAMENTALS_FILE: &str = "latest_fundamentals.json";
pub const HISTORY_FILE: &str = "latest_history.json";

const DEFAULT_CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const DEFAULT_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";
const DEFAULT_CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";

#[derive(Debug, Clone, Validate)]
pub struct PipelineConfig {
    #[validate(length(min = 1, max = 20), custom(function = "validate_tickers"))]
    pub tickers: Vec<String>,
    #[validate(range(min = 1, max = 10))]
    pub lookback_years: u32,
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
    pub retry_pause: Duration,
    pub output_dir: PathBuf,
    /// Data client cache wiped before each price download attempt.
    pub cache_dir: Option<PathBuf>,
    #[validate(url)]
    pub chart_url: String,
    #[validate(url)]
    pub summary_url: String,
    /// Sets the session cookie the crumb is bound to.
    #[validate(url)]
    pub cookie_url: String,
    #[validate(url)]
    pub crumb_url: String,
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            tickers: TICKERS.iter().map(|t| t.to_string()).collect(),
            lookback_years: 3,
            max_attempts: 3,
            retry_pause: Duration::from_secs(2),
            output_dir: PathBuf::from("..").join("dashboard").join("public"),
            cache_dir: provider_cache_dir(DEFAULT_CACHE_NAME),
            chart_url: DEFAULT_CHART_URL.to_string(),
            summary_url: DEFAULT_SUMMARY_URL.to_string(),
            cookie_url: DEFAULT_COOKIE_URL.to_string(),
            crumb_url: DEFAULT_CRUMB_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `PIPELINE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = PipelineConfig::default();

        if let Some(raw) = lookup("PIPELINE_TICKERS") {
            config.tickers = raw
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(dir) = lookup("PIPELINE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("PIPELINE_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(years) = lookup("PIPELINE_LOOKBACK_YEARS") {
            config.lookback_years = years
                .trim()
                .parse()
                .map_err(|_| PipelineError::Config(format!("PIPELINE_LOOKBACK_YEARS is not a number: {}", years)))?;
        }

        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn fundamentals_path(&self) -> PathBuf {
        self.output_dir.join(FUNDAMENTALS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(HISTORY_FILE)
    }
}

fn validate_tickers(tickers: &Vec<String>) -> std::result::Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    for ticker in tickers {
        if ticker.trim().is_empty() || !seen.insert(ticker.as_str()) {
            return Err(ValidationError::new("tickers_must_be_unique_and_non_empty"));
        }
    }
    Ok(())
}
