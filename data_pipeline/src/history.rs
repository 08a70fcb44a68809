// src/history.rs

use crate::cache;
use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::models::PriceTable;
use crate::provider::{MarketDataProvider, PriceFrame};
use crate::utils::one_year_before;
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Blocks between retry attempts.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

pub struct ThreadSleep;

impl Pause for ThreadSleep {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub lookback_years: u32,
    pub max_attempts: u32,
    pub retry_pause: Duration,
    /// Provider cache cleared before each attempt, if any.
    pub cache_dir: Option<PathBuf>,
}

impl From<&PipelineConfig> for HistoryOptions {
    fn from(config: &PipelineConfig) -> Self {
        HistoryOptions {
            lookback_years: config.lookback_years,
            max_attempts: config.max_attempts,
            retry_pause: config.retry_pause,
            cache_dir: config.cache_dir.clone(),
        }
    }
}

/// Maps either provider shape onto one column per requested ticker.
pub fn normalize_frame(tickers: &[String], frame: PriceFrame) -> PriceTable {
    match frame {
        PriceFrame::Flat(points) => match tickers {
            [ticker] => PriceTable::from_columns(vec![(ticker.clone(), points)]),
            _ => {
                warn!(
                    "Received an ungrouped price frame for {} tickers, cannot attribute columns",
                    tickers.len()
                );
                PriceTable::new()
            }
        },
        PriceFrame::Grouped(mut groups) => {
            let mut columns = Vec::with_capacity(tickers.len());
            for ticker in tickers {
                match groups.remove(ticker) {
                    Some(points) => columns.push((ticker.clone(), points)),
                    None => warn!("Could not extract price for {}: missing from response", ticker),
                }
            }
            PriceTable::from_columns(columns)
        }
    }
}

/// Forward-filled, gap-free price table over the whole lookback window.
/// Returns an empty table once every attempt has failed.
pub fn fetch_cleaned_history<P, S>(
    provider: &P,
    tickers: &[String],
    options: &HistoryOptions,
    pause: &S,
    today: NaiveDate,
) -> PriceTable
where
    P: MarketDataProvider + ?Sized,
    S: Pause + ?Sized,
{
    let start = today - ChronoDuration::days(i64::from(options.lookback_years) * 365);
    info!("Fetching price history from {}...", start);

    if options.cache_dir.is_none() {
        warn!("Could not clear cache (non-critical): no cache location");
    }

    let max_attempts = options.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        if let Some(dir) = &options.cache_dir {
            cache::clear_cache_dir(dir);
        }

        match download_attempt(provider, tickers, start, today) {
            Ok(mut prices) => {
                prices.forward_fill();
                prices.drop_empty_rows();
                return prices;
            }
            Err(e) => {
                warn!("Attempt {}/{} failed: {}", attempt, max_attempts, e);
                if attempt < max_attempts {
                    pause.pause(options.retry_pause);
                }
            }
        }
    }

    error!("Failed to download price data after {} attempts.", max_attempts);
    PriceTable::new()
}

/// Cleaned history restricted to the trailing calendar year.
pub fn fetch_price_history<P, S>(
    provider: &P,
    tickers: &[String],
    options: &HistoryOptions,
    pause: &S,
    today: NaiveDate,
) -> PriceTable
where
    P: MarketDataProvider + ?Sized,
    S: Pause + ?Sized,
{
    fetch_cleaned_history(provider, tickers, options, pause, today).after(one_year_before(today))
}

fn download_attempt<P>(
    provider: &P,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceTable, ProviderError>
where
    P: MarketDataProvider + ?Sized,
{
    let frame = provider.download_prices(tickers, start, end)?;
    let prices = normalize_frame(tickers, frame);
    if prices.is_empty() {
        return Err(ProviderError::NoData("Received empty price data".to_string()));
    }
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InfoPayload;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    struct ScriptedProvider {
        failures: Cell<u32>,
        frame: PriceFrame,
        calls: Cell<u32>,
        requested: RefCell<Option<(NaiveDate, NaiveDate)>>,
    }

    impl ScriptedProvider {
        fn new(failures: u32, frame: PriceFrame) -> Self {
            ScriptedProvider {
                failures: Cell::new(failures),
                frame,
                calls: Cell::new(0),
                requested: RefCell::new(None),
            }
        }
    }

    impl MarketDataProvider for ScriptedProvider {
        fn download_prices(
            &self,
            _tickers: &[String],
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceFrame, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            *self.requested.borrow_mut() = Some((start, end));
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(ProviderError::NoData("connection reset".to_string()));
            }
            Ok(self.frame.clone())
        }

        fn info(&self, ticker: &str) -> Result<InfoPayload, ProviderError> {
            Err(ProviderError::NoData(ticker.to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingPause {
        pauses: RefCell<Vec<Duration>>,
    }

    impl Pause for RecordingPause {
        fn pause(&self, duration: Duration) {
            self.pauses.borrow_mut().push(duration);
        }
    }

    fn options() -> HistoryOptions {
        HistoryOptions {
            lookback_years: 3,
            max_attempts: 3,
            retry_pause: Duration::from_secs(2),
            cache_dir: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()
    }

    fn day(offset: i64) -> NaiveDate {
        today() - ChronoDuration::days(offset)
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn grouped_frame() -> PriceFrame {
        let mut groups = BTreeMap::new();
        groups.insert(
            "NESTE.HE".to_string(),
            vec![(day(3), Some(20.0)), (day(2), None), (day(1), Some(21.0))],
        );
        groups.insert(
            "FORTUM.HE".to_string(),
            vec![(day(4), None), (day(3), Some(14.0)), (day(2), Some(14.5))],
        );
        PriceFrame::Grouped(groups)
    }

    #[test]
    fn test_flat_frame_single_ticker_gets_named_column() {
        let frame = PriceFrame::Flat(vec![(day(2), Some(10.0)), (day(1), Some(11.0))]);
        let table = normalize_frame(&tickers(&["KEMPOWR.HE"]), frame);

        assert_eq!(table.tickers(), vec!["KEMPOWR.HE"]);
        assert_eq!(table.column("KEMPOWR.HE").unwrap(), &[Some(10.0), Some(11.0)]);
    }

    #[test]
    fn test_flat_frame_with_many_tickers_is_empty() {
        let frame = PriceFrame::Flat(vec![(day(1), Some(11.0))]);
        assert!(normalize_frame(&tickers(&["A", "B"]), frame).is_empty());
    }

    #[test]
    fn test_missing_ticker_is_skipped() {
        let table = normalize_frame(&tickers(&["FORTUM.HE", "VALMT.HE", "NESTE.HE"]), grouped_frame());
        assert_eq!(table.tickers(), vec!["FORTUM.HE", "NESTE.HE"]);
    }

    #[test]
    fn test_success_cleans_table() {
        let provider = ScriptedProvider::new(0, grouped_frame());
        let pause = RecordingPause::default();
        let table = fetch_cleaned_history(&provider, &tickers(&["NESTE.HE", "FORTUM.HE"]), &options(), &pause, today());

        // day(4) had no price for anyone and is dropped
        assert_eq!(table.dates(), &[day(3), day(2), day(1)]);
        assert_eq!(table.column("NESTE.HE").unwrap(), &[Some(20.0), Some(20.0), Some(21.0)]);
        assert_eq!(table.column("FORTUM.HE").unwrap(), &[Some(14.0), Some(14.5), Some(14.5)]);
        assert!(pause.pauses.borrow().is_empty());
        assert_eq!(*provider.requested.borrow(), Some((today() - ChronoDuration::days(3 * 365), today())));
    }

    #[test]
    fn test_retry_then_success_matches_direct_success() {
        let names = tickers(&["NESTE.HE", "FORTUM.HE"]);
        let direct = fetch_cleaned_history(
            &ScriptedProvider::new(0, grouped_frame()),
            &names,
            &options(),
            &RecordingPause::default(),
            today(),
        );

        let provider = ScriptedProvider::new(2, grouped_frame());
        let pause = RecordingPause::default();
        let retried = fetch_cleaned_history(&provider, &names, &options(), &pause, today());

        assert_eq!(retried, direct);
        assert_eq!(provider.calls.get(), 3);
        assert_eq!(*pause.pauses.borrow(), vec![Duration::from_secs(2); 2]);
    }

    #[test]
    fn test_exhausted_retries_return_empty_table() {
        let provider = ScriptedProvider::new(3, grouped_frame());
        let pause = RecordingPause::default();
        let table = fetch_cleaned_history(&provider, &tickers(&["NESTE.HE"]), &options(), &pause, today());

        assert!(table.is_empty());
        assert_eq!(provider.calls.get(), 3);
        // No pause after the final attempt
        assert_eq!(pause.pauses.borrow().len(), 2);
    }

    #[test]
    fn test_empty_response_is_retried() {
        let provider = ScriptedProvider::new(0, PriceFrame::Grouped(BTreeMap::new()));
        let pause = RecordingPause::default();
        let table = fetch_cleaned_history(&provider, &tickers(&["NESTE.HE"]), &options(), &pause, today());

        assert!(table.is_empty());
        assert_eq!(provider.calls.get(), 3);
    }

    #[test]
    fn test_fetch_price_history_keeps_trailing_year() {
        let frame = PriceFrame::Flat(vec![
            (day(800), Some(5.0)),
            (day(400), Some(6.0)),
            (day(365), Some(7.0)),
            (day(10), Some(8.0)),
        ]);
        let provider = ScriptedProvider::new(0, frame);
        let table = fetch_price_history(&provider, &tickers(&["VALMT.HE"]), &options(), &RecordingPause::default(), today());

        // 2025-01-20 is exactly one calendar year back and falls outside
        assert_eq!(table.dates(), &[day(10)]);
    }

    // Writes a file into the cache on every download, the way the data
    // client would, and records whether it was still there
    struct CachingProvider {
        cache_dir: PathBuf,
        inner: ScriptedProvider,
        found_stale: RefCell<Vec<bool>>,
    }

    impl MarketDataProvider for CachingProvider {
        fn download_prices(
            &self,
            tickers: &[String],
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceFrame, ProviderError> {
            let marker = self.cache_dir.join("tz").join("NESTE.HE.json");
            self.found_stale.borrow_mut().push(marker.exists());
            std::fs::create_dir_all(self.cache_dir.join("tz")).unwrap();
            std::fs::write(&marker, "Europe/Helsinki").unwrap();
            self.inner.download_prices(tickers, start, end)
        }

        fn info(&self, ticker: &str) -> Result<InfoPayload, ProviderError> {
            self.inner.info(ticker)
        }
    }

    #[test]
    fn test_cache_cleared_before_every_attempt() {
        let root = tempfile::tempdir().unwrap();
        let cache_dir = root.path().join("yfinance-rs");
        std::fs::create_dir_all(cache_dir.join("tz")).unwrap();
        std::fs::write(cache_dir.join("tz").join("NESTE.HE.json"), "stale").unwrap();

        let provider = CachingProvider {
            cache_dir: cache_dir.clone(),
            inner: ScriptedProvider::new(2, grouped_frame()),
            found_stale: RefCell::new(Vec::new()),
        };
        let options = HistoryOptions { cache_dir: Some(cache_dir.clone()), ..options() };
        let table = fetch_cleaned_history(
            &provider,
            &tickers(&["NESTE.HE"]),
            &options,
            &RecordingPause::default(),
            today(),
        );

        assert!(!table.is_empty());
        assert_eq!(*provider.found_stale.borrow(), vec![false, false, false]);
        assert!(root.path().exists());
    }

    #[test]
    fn test_unremovable_cache_does_not_block_download() {
        let root = tempfile::tempdir().unwrap();
        let cache_file = root.path().join("yfinance-rs");
        std::fs::write(&cache_file, "not a directory").unwrap();

        let provider = ScriptedProvider::new(0, grouped_frame());
        let options = HistoryOptions { cache_dir: Some(cache_file.clone()), ..options() };
        let table = fetch_cleaned_history(
            &provider,
            &tickers(&["NESTE.HE", "FORTUM.HE"]),
            &options,
            &RecordingPause::default(),
            today(),
        );

        assert_eq!(table.tickers(), vec!["NESTE.HE", "FORTUM.HE"]);
        assert_eq!(provider.calls.get(), 1);
        assert!(cache_file.is_file());
    }

    #[test]
    fn test_options_take_cache_dir_from_config() {
        let config = PipelineConfig {
            cache_dir: Some(PathBuf::from("/tmp/yf-cache")),
            ..PipelineConfig::default()
        };
        let options = HistoryOptions::from(&config);

        assert_eq!(options.cache_dir, Some(PathBuf::from("/tmp/yf-cache")));
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.retry_pause, Duration::from_secs(2));
    }
}
