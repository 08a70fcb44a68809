// src/pipeline.rs

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::fundamentals::fetch_fundamentals;
use crate::history::{fetch_cleaned_history, HistoryOptions, Pause, ThreadSleep};
use crate::models::{DashboardRecord, FundamentalsRecord, HistoryRecord, PerformanceRecord, PipelineResult, PriceTable};
use crate::performance::performance_metrics;
use crate::provider::MarketDataProvider;
use crate::yahoo::YahooProvider;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, info_span, warn};

/// Days of history published for the dashboard chart.
pub const CHART_WINDOW_DAYS: i64 = 365;

pub struct Pipeline<P, S = ThreadSleep> {
    config: PipelineConfig,
    provider: P,
    pause: S,
}

impl<P: MarketDataProvider> Pipeline<P, ThreadSleep> {
    pub fn new(config: PipelineConfig, provider: P) -> Self {
        Pipeline { config, provider, pause: ThreadSleep }
    }
}

impl<P: MarketDataProvider, S: Pause> Pipeline<P, S> {
    pub fn with_pause(config: PipelineConfig, provider: P, pause: S) -> Self {
        Pipeline { config, provider, pause }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pause(&self) -> &S {
        &self.pause
    }

    pub fn run(&self) -> Result<PipelineResult> {
        self.run_at(Utc::now().date_naive())
    }

    /// Fetches, merges and publishes. An empty result means the run failed
    /// and nothing was written.
    pub fn run_at(&self, today: NaiveDate) -> Result<PipelineResult> {
        let span = info_span!("pipeline_run", %today, tickers = self.config.tickers.len());
        let _guard = span.enter();
        info!("Starting Pipeline Execution...");

        let tickers = &self.config.tickers;
        let full_history = fetch_cleaned_history(
            &self.provider,
            tickers,
            &HistoryOptions::from(&self.config),
            &self.pause,
            today,
        );
        let performance = performance_metrics(&full_history);
        let fundamentals = fetch_fundamentals(&self.provider, tickers);

        if fundamentals.is_empty() {
            error!("Pipeline failed: Empty data.");
            return Ok(PipelineResult::empty());
        }

        let history = if full_history.is_empty() {
            warn!("Full history is empty, skipping chart data.");
            Vec::new()
        } else {
            chart_history(&full_history, today)
        };

        let result = PipelineResult {
            fundamentals: merge_performance(fundamentals, &performance),
            history,
        };

        write_outputs(&self.config, &result)?;
        info!("Data exported to: {}", self.config.output_dir.display());
        Ok(result)
    }
}

/// Runs once against Yahoo Finance.
pub fn run_pipeline(config: PipelineConfig) -> Result<PipelineResult> {
    let provider = YahooProvider::new(&config)?;
    Pipeline::new(config, provider).run()
}

/// Left join on ticker: every fundamentals row is kept in order, performance
/// rows without fundamentals are dropped.
pub fn merge_performance(
    fundamentals: Vec<FundamentalsRecord>,
    performance: &[PerformanceRecord],
) -> Vec<DashboardRecord> {
    fundamentals
        .into_iter()
        .map(|record| {
            let perf = performance.iter().find(|p| p.ticker == record.ticker);
            DashboardRecord {
                price: perf.and_then(|p| p.price),
                return_1y: perf.and_then(|p| p.return_1y),
                cagr_3y: perf.and_then(|p| p.cagr_3y),
                fundamentals: record,
            }
        })
        .collect()
}

pub fn chart_history(prices: &PriceTable, today: NaiveDate) -> Vec<HistoryRecord> {
    prices
        .after(today - Duration::days(CHART_WINDOW_DAYS))
        .history_records()
}

pub fn write_outputs(config: &PipelineConfig, result: &PipelineResult) -> Result<()> {
    std::fs::create_dir_all(&config.output_dir).map_err(|source| PipelineError::Io {
        path: config.output_dir.clone(),
        source,
    })?;
    write_json(&config.fundamentals_path(), &result.fundamentals)?;
    write_json(&config.history_path(), &result.history)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, records: &T) -> Result<()> {
    let bytes = serde_json::to_vec(records)?;
    std::fs::write(path, bytes).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}
