use analysis_core::{AnalysisError, Assessment, PriceHistoryProvider, ScanFailure, ScanReport, ScoreResult};
use std::time::Duration;
use technical_analysis::{score_series, MIN_SCORING_BARS};
use tokio::sync::watch;

use crate::pacing::{Pacer, TokioPacer};

/// Default settling interval between two tickers
pub const DEFAULT_PACING_MS: u64 = 1500;

/// Message recorded for tickers skipped by a cancelled scan
pub const CANCELLED_MESSAGE: &str = "scan cancelled";

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Pause between the end of one ticker and the next fetch
    pub pacing: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(DEFAULT_PACING_MS),
        }
    }
}

/// Fetches and scores tickers one at a time, in request order.
///
/// Every ticker but the last is followed by the pacing interval, whether it
/// succeeded or not. A failing ticker never aborts the batch.
pub struct StockScanner<P, Z = TokioPacer> {
    provider: P,
    pacer: Z,
    config: ScanConfig,
}

impl<P: PriceHistoryProvider> StockScanner<P, TokioPacer> {
    pub fn new(provider: P, config: ScanConfig) -> Self {
        Self::with_pacer(provider, TokioPacer, config)
    }
}

impl<P: PriceHistoryProvider, Z: Pacer> StockScanner<P, Z> {
    pub fn with_pacer(provider: P, pacer: Z, config: ScanConfig) -> Self {
        Self { provider, pacer, config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan every ticker and rank the ones that could be scored
    pub async fn scan(&self, tickers: &[String]) -> Result<ScanReport, AnalysisError> {
        self.run(tickers, None).await
    }

    /// Like [`scan`](Self::scan), but stops before the next fetch once `cancel` reads `true`.
    /// Tickers that were never reached are reported as errors.
    pub async fn scan_until(
        &self,
        tickers: &[String],
        cancel: watch::Receiver<bool>,
    ) -> Result<ScanReport, AnalysisError> {
        self.run(tickers, Some(&cancel)).await
    }

    async fn run(
        &self,
        tickers: &[String],
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<ScanReport, AnalysisError> {
        let tickers = validate_tickers(tickers)?;
        let total = tickers.len();

        tracing::info!("📊 Starting scan of {} tickers", total);

        let mut ranked: Vec<ScoreResult> = Vec::with_capacity(total);
        let mut errors: Vec<ScanFailure> = Vec::new();

        for (i, ticker) in tickers.iter().enumerate() {
            if is_cancelled(cancel) {
                tracing::warn!("Scan cancelled with {} of {} tickers remaining", total - i, total);
                errors.extend(tickers[i..].iter().map(|t| ScanFailure {
                    ticker: t.clone(),
                    message: CANCELLED_MESSAGE.to_string(),
                }));
                break;
            }

            match self.scan_one(ticker).await {
                Ok(result) => ranked.push(result),
                Err(message) => {
                    tracing::warn!("Error scanning {}: {}", ticker, message);
                    errors.push(ScanFailure {
                        ticker: ticker.clone(),
                        message,
                    });
                }
            }

            // Cancelled mid-fetch: skip the trailing pause
            if i + 1 < total && !is_cancelled(cancel) {
                self.pacer.pause(self.config.pacing).await;
            }
        }

        // Stable: equal scores keep request order
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        tracing::info!(
            "✅ Scan complete: {} ranked, {} failed",
            ranked.len(),
            errors.len()
        );

        Ok(ScanReport {
            scanned_at: chrono::Utc::now(),
            ranked,
            errors,
        })
    }

    async fn scan_one(&self, ticker: &str) -> Result<ScoreResult, String> {
        let series = self
            .provider
            .fetch_daily(ticker)
            .await
            .map_err(|e| e.to_string())?;

        match score_series(&series).map_err(|e| e.to_string())? {
            Assessment::Scored(result) => Ok(result),
            Assessment::InsufficientData { available, .. } => Err(format!(
                "Insufficient data ({} closes, need {})",
                available, MIN_SCORING_BARS
            )),
        }
    }
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

/// Exchange symbols: letters, digits and `.^=-` (e.g. `BRK.B`, `^GSPC`, `EURUSD=X`).
fn is_valid_symbol(symbol: &str) -> bool {
    symbol.chars().any(|c| c.is_ascii_alphanumeric())
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-'))
}

/// Reject an empty ticker list, blank symbols or symbols with characters no
/// exchange uses; returns trimmed symbols.
pub fn validate_tickers(tickers: &[String]) -> Result<Vec<String>, AnalysisError> {
    if tickers.is_empty() {
        return Err(AnalysisError::InvalidInput("ticker list is empty".to_string()));
    }

    tickers
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let t = t.trim();
            if t.is_empty() {
                Err(AnalysisError::InvalidInput(format!("ticker at position {} is blank", i)))
            } else if !is_valid_symbol(t) {
                Err(AnalysisError::InvalidInput(format!("ticker {:?} is not a valid symbol", t)))
            } else {
                Ok(t.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{PriceSeries, TrendSignal};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type EventLog = Arc<Mutex<Vec<String>>>;

    struct MockProvider {
        series: HashMap<String, Result<PriceSeries, AnalysisError>>,
        log: EventLog,
        cancel_on: Option<(String, watch::Sender<bool>)>,
    }

    impl MockProvider {
        fn new(log: EventLog) -> Self {
            Self { series: HashMap::new(), log, cancel_on: None }
        }

        fn with(mut self, ticker: &str, series: Result<PriceSeries, AnalysisError>) -> Self {
            self.series.insert(ticker.to_string(), series);
            self
        }
    }

    #[async_trait]
    impl PriceHistoryProvider for MockProvider {
        async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, AnalysisError> {
            self.log.lock().unwrap().push(format!("fetch:{}", ticker));
            if let Some((trigger, tx)) = &self.cancel_on {
                if trigger == ticker {
                    tx.send(true).unwrap();
                }
            }
            self.series
                .get(ticker)
                .cloned()
                .unwrap_or_else(|| Err(AnalysisError::fetch(ticker, format!("No data for {}", ticker))))
        }
    }

    struct RecordingPacer {
        log: EventLog,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, interval: Duration) {
            self.log.lock().unwrap().push(format!("pause:{}", interval.as_millis()));
        }
    }

    /// 35 flat closes at 100. Scores 40 with flat volume; a bigger last volume
    /// lifts only the volume bucket.
    fn flat_series(ticker: &str, last_volume: f64) -> PriceSeries {
        let mut volume = vec![1000.0; 34];
        volume.push(last_volume);
        PriceSeries {
            ticker: ticker.to_string(),
            timestamps: (0..35).map(|i| 1_700_000_000 + i * 86_400).collect(),
            close: vec![100.0; 35],
            high: vec![101.0; 35],
            low: vec![99.0; 35],
            volume,
        }
    }

    fn short_series(ticker: &str) -> PriceSeries {
        PriceSeries {
            ticker: ticker.to_string(),
            timestamps: (0..10).collect(),
            close: vec![50.0; 10],
            high: vec![51.0; 10],
            low: vec![49.0; 10],
            volume: vec![500.0; 10],
        }
    }

    fn scanner(provider: MockProvider, log: &EventLog) -> StockScanner<MockProvider, RecordingPacer> {
        StockScanner::with_pacer(provider, RecordingPacer { log: log.clone() }, ScanConfig::default())
    }

    fn tickers(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_list_rejected_before_fetching() {
        let log = EventLog::default();
        let s = scanner(MockProvider::new(log.clone()), &log);

        let err = s.scan(&[]).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_ticker_rejected_before_fetching() {
        let log = EventLog::default();
        let provider = MockProvider::new(log.clone()).with("AAA", Ok(flat_series("AAA", 1000.0)));
        let s = scanner(provider, &log);

        let err = s.scan(&tickers(&["AAA", "  "])).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_flat_ticker() {
        let log = EventLog::default();
        let provider = MockProvider::new(log.clone()).with("AAA", Ok(flat_series("AAA", 1000.0)));
        let s = scanner(provider, &log);

        let report = s.scan(&tickers(&["AAA"])).await.unwrap();
        assert_eq!(report.ranked.len(), 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.ranked[0].score, 40);
        assert_eq!(report.ranked[0].trend_signal, TrendSignal::Down);
        // No pause after the last ticker
        assert_eq!(*log.lock().unwrap(), vec!["fetch:AAA"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_still_paces() {
        let log = EventLog::default();
        let provider = MockProvider::new(log.clone())
            .with("AAA", Ok(flat_series("AAA", 1000.0)))
            .with("CCC", Ok(flat_series("CCC", 5000.0)));
        let s = scanner(provider, &log);

        let report = s.scan(&tickers(&["AAA", "BAD", "CCC"])).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["fetch:AAA", "pause:1500", "fetch:BAD", "pause:1500", "fetch:CCC"]
        );
        assert_eq!(report.errors, vec![ScanFailure { ticker: "BAD".into(), message: "No data for BAD".into() }]);
        let ranked: Vec<&str> = report.ranked.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(ranked, vec!["CCC", "AAA"]);
    }

    #[tokio::test]
    async fn test_ranking_descending_and_stable() {
        let log = EventLog::default();
        // volume spikes: 1000 -> 40, 1300 -> 47, 5000 -> 50
        let provider = MockProvider::new(log.clone())
            .with("LOW1", Ok(flat_series("LOW1", 1000.0)))
            .with("MID", Ok(flat_series("MID", 1300.0)))
            .with("LOW2", Ok(flat_series("LOW2", 1000.0)))
            .with("TOP", Ok(flat_series("TOP", 5000.0)));
        let s = scanner(provider, &log);

        let report = s.scan(&tickers(&["LOW1", "MID", "LOW2", "TOP"])).await.unwrap();
        let ranked: Vec<(&str, u8)> = report.ranked.iter().map(|r| (r.ticker.as_str(), r.score)).collect();
        assert_eq!(ranked, vec![("TOP", 50), ("MID", 47), ("LOW1", 40), ("LOW2", 40)]);

        let pauses = log.lock().unwrap().iter().filter(|e| e.starts_with("pause")).count();
        assert_eq!(pauses, 3);
    }

    #[tokio::test]
    async fn test_insufficient_and_scoring_failures_reported() {
        let log = EventLog::default();
        let mut no_volume = flat_series("NOVOL", 1000.0);
        no_volume.volume = vec![0.0; 35];
        let provider = MockProvider::new(log.clone())
            .with("SHORT", Ok(short_series("SHORT")))
            .with("NOVOL", Ok(no_volume))
            .with("OK", Ok(flat_series("OK", 1000.0)));
        let s = scanner(provider, &log);

        let report = s.scan(&tickers(&["SHORT", "NOVOL", "OK"])).await.unwrap();
        assert_eq!(report.ranked.len(), 1);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].ticker, "SHORT");
        assert!(report.errors[0].message.starts_with("Insufficient data"));
        assert_eq!(report.errors[1].ticker, "NOVOL");
        assert!(report.errors[1].message.contains("insufficient volume data"));
    }

    #[tokio::test]
    async fn test_ranked_and_errors_partition_request() {
        let log = EventLog::default();
        let provider = MockProvider::new(log.clone())
            .with("A", Ok(flat_series("A", 1000.0)))
            .with("C", Ok(short_series("C")))
            .with("D", Ok(flat_series("D", 2000.0)));
        let s = scanner(provider, &log);
        let requested = tickers(&["A", "B", "C", "D", "E"]);

        let report = s.scan(&requested).await.unwrap();

        let mut seen: Vec<String> = report
            .ranked
            .iter()
            .map(|r| r.ticker.clone())
            .chain(report.errors.iter().map(|e| e.ticker.clone()))
            .collect();
        seen.sort();
        assert_eq!(seen, requested);
        for failure in &report.errors {
            assert!(report.ranked.iter().all(|r| r.ticker != failure.ticker));
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let log = EventLog::default();
        let provider = MockProvider::new(log.clone()).with("A", Ok(flat_series("A", 1000.0)));
        let s = scanner(provider, &log);
        let (_tx, rx) = watch::channel(true);

        let report = s.scan_until(&tickers(&["A", "B"]), rx).await.unwrap();
        assert!(report.ranked.is_empty());
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().all(|e| e.message == CANCELLED_MESSAGE));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_takes_effect_between_tickers() {
        let log = EventLog::default();
        let (tx, rx) = watch::channel(false);
        let mut provider = MockProvider::new(log.clone())
            .with("A", Ok(flat_series("A", 1000.0)))
            .with("B", Ok(flat_series("B", 1000.0)))
            .with("C", Ok(flat_series("C", 1000.0)));
        provider.cancel_on = Some(("B".to_string(), tx));
        let s = scanner(provider, &log);

        let report = s.scan_until(&tickers(&["A", "B", "C"]), rx).await.unwrap();

        // B was already in flight and completes; no pause after it and C is never fetched
        assert_eq!(
            *log.lock().unwrap(),
            vec!["fetch:A", "pause:1500", "fetch:B"]
        );
        assert_eq!(report.ranked.len(), 2);
        assert_eq!(report.errors, vec![ScanFailure { ticker: "C".into(), message: CANCELLED_MESSAGE.into() }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_pacer_waits_between_tickers() {
        let log = EventLog::default();
        let provider = MockProvider::new(log.clone())
            .with("A", Ok(flat_series("A", 1000.0)))
            .with("B", Ok(flat_series("B", 1000.0)))
            .with("C", Ok(flat_series("C", 1000.0)));
        let s = StockScanner::new(provider, ScanConfig::default());

        let start = tokio::time::Instant::now();
        let report = s.scan(&tickers(&["A", "B", "C"])).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(report.ranked.len(), 3);
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[test]
    fn test_validate_tickers_trims() {
        let cleaned = validate_tickers(&tickers(&[" AAPL ", "MSFT"])).unwrap();
        assert_eq!(cleaned, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_validate_tickers_accepts_exchange_symbols() {
        let symbols = tickers(&["BRK.B", "BRK-B", "^GSPC", "EURUSD=X", "7203.T"]);
        assert_eq!(validate_tickers(&symbols).unwrap(), symbols);
    }

    #[test]
    fn test_validate_tickers_rejects_path_and_query_characters() {
        for hostile in ["../../v7/finance/quote?symbols=X#", "AAPL/../MSFT", "A?B", "A#B", "..", "A B"] {
            let err = validate_tickers(&tickers(&["AAPL", hostile])).unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInput(_)), "accepted {:?}", hostile);
        }
    }

    #[tokio::test]
    async fn test_hostile_symbol_rejected_before_fetching() {
        let log = EventLog::default();
        let provider = MockProvider::new(log.clone()).with("AAA", Ok(flat_series("AAA", 1000.0)));
        let s = scanner(provider, &log);

        let err = s.scan(&tickers(&["AAA", "../quote?symbols=X"])).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
        assert!(log.lock().unwrap().is_empty());
    }
}
