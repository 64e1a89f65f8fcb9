use analysis_core::{AnalysisError, PriceHistoryProvider, PriceSeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_LOOKBACK_DAYS: i64 = 90;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; stock-scanner/0.1)";

/// Connection settings for the chart endpoint
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub base_url: String,
    /// Size of the daily window ending now
    pub lookback_days: i64,
    pub timeout: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Daily OHLCV fetcher backed by the Yahoo Finance v8 chart API.
///
/// One request per call, no retries: callers own pacing.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    settings: YahooSettings,
}

impl YahooClient {
    pub fn new() -> Self {
        Self::with_settings(YahooSettings::default())
    }

    pub fn with_settings(settings: YahooSettings) -> Self {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, settings }
    }

    pub fn settings(&self) -> &YahooSettings {
        &self.settings
    }

    /// Chart URL and query for a daily window ending at `now`.
    ///
    /// The ticker is pushed as a single percent-encoded path segment, so `/`,
    /// `?` or `#` in a symbol cannot leave the chart endpoint.
    pub fn chart_request(
        &self,
        ticker: &str,
        now: DateTime<Utc>,
    ) -> Result<(Url, Vec<(&'static str, String)>), AnalysisError> {
        let invalid_base = || AnalysisError::fetch(ticker, format!("Invalid base URL {}", self.settings.base_url));

        let mut url = Url::parse(&self.settings.base_url).map_err(|_| invalid_base())?;
        url.path_segments_mut()
            .map_err(|_| invalid_base())?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);

        let period2 = now.timestamp();
        let period1 = period2 - self.settings.lookback_days * SECONDS_PER_DAY;
        let query = vec![
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
        ];
        Ok((url, query))
    }

    /// Get the daily price window for a ticker
    pub async fn get_daily_series(&self, ticker: &str) -> Result<PriceSeries, AnalysisError> {
        let (url, query) = self.chart_request(ticker, Utc::now())?;
        tracing::debug!("Fetching {} ({} days)", ticker, self.settings.lookback_days);

        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|e| AnalysisError::fetch(ticker, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::fetch(ticker, e.to_string()))?;

        // Unknown symbols come back as 404 with a JSON error body
        match serde_json::from_str::<ChartResponse>(&body) {
            Ok(chart) => series_from_chart(ticker, chart),
            Err(_) if !status.is_success() => {
                Err(AnalysisError::fetch(ticker, format!("HTTP {} for {}", status, ticker)))
            }
            Err(e) => Err(AnalysisError::fetch(
                ticker,
                format!("Malformed chart response for {}: {}", ticker, e),
            )),
        }
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooClient {
    async fn fetch_daily(&self, ticker: &str) -> Result<PriceSeries, AnalysisError> {
        self.get_daily_series(ticker).await
    }
}

/// Turn a decoded chart payload into a row-aligned series.
///
/// A row survives only if its timestamp, close, high, low and volume are all
/// present. No result, or nothing left after filtering, is a fetch failure.
pub fn series_from_chart(ticker: &str, response: ChartResponse) -> Result<PriceSeries, AnalysisError> {
    let chart = response.chart;

    let result = match chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result,
        None => {
            let message = chart
                .error
                .and_then(|e| e.description)
                .map(|d| format!("No data for {}: {}", ticker, d))
                .unwrap_or_else(|| format!("No data for {}", ticker));
            return Err(AnalysisError::fetch(ticker, message));
        }
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    let mut series = PriceSeries {
        ticker: ticker.to_string(),
        timestamps: Vec::with_capacity(timestamps.len()),
        close: Vec::with_capacity(timestamps.len()),
        high: Vec::with_capacity(timestamps.len()),
        low: Vec::with_capacity(timestamps.len()),
        volume: Vec::with_capacity(timestamps.len()),
    };

    for (i, ts) in timestamps.iter().enumerate() {
        let row = (
            *ts,
            value_at(&quote.close, i),
            value_at(&quote.high, i),
            value_at(&quote.low, i),
            value_at(&quote.volume, i),
        );
        if let (Some(ts), Some(close), Some(high), Some(low), Some(volume)) = row {
            series.timestamps.push(ts);
            series.close.push(close);
            series.high.push(high);
            series.low.push(low);
            series.volume.push(volume);
        }
    }

    let dropped = timestamps.len() - series.len();
    if dropped > 0 {
        tracing::debug!("{}: dropped {} incomplete rows", ticker, dropped);
    }

    if series.is_empty() {
        return Err(AnalysisError::fetch(ticker, format!("No data for {}", ticker)));
    }

    Ok(series)
}

fn value_at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<Option<i64>>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}
