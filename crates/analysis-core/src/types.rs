use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats::round_to;

/// Daily OHLCV history for one ticker.
///
/// All vectors are index-aligned and of equal length. Rows with a null in any
/// column are dropped before the series is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    /// Unix seconds
    pub timestamps: Vec<i64>,
    pub close: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub volume: Vec<f64>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Last closing price
    pub fn current_price(&self) -> Option<f64> {
        self.close.last().copied()
    }
}

/// MACD line, signal line and histogram at the last bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdValue {
    pub value: f64,
    /// Absent until the MACD line is long enough for a 9-period EMA
    pub signal: Option<f64>,
    pub histogram: f64,
    pub bullish: bool,
}

/// Indicators computed for one ticker. `None` means not enough history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub macd: Option<MacdValue>,
    pub ema20: Option<f64>,
    pub ema50: Option<f64>,
    pub volume_ratio: f64,
    pub above_ema20: bool,
    pub above_ema50: bool,
}

impl IndicatorSet {
    /// Copy with display precision applied: 1 decimal for RSI, 2 for everything else.
    pub fn rounded(&self) -> Self {
        Self {
            rsi: self.rsi.map(|v| round_to(v, 1)),
            macd: self.macd.map(|m| MacdValue {
                value: round_to(m.value, 2),
                signal: m.signal.map(|s| round_to(s, 2)),
                histogram: round_to(m.histogram, 2),
                bullish: m.bullish,
            }),
            ema20: self.ema20.map(|v| round_to(v, 2)),
            ema50: self.ema50.map(|v| round_to(v, 2)),
            volume_ratio: round_to(self.volume_ratio, 2),
            above_ema20: self.above_ema20,
            above_ema50: self.above_ema50,
        }
    }
}

/// Coarse trend classification derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendSignal {
    Down,
    Weak,
    Moderate,
    Strong,
}

impl TrendSignal {
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 75 => TrendSignal::Strong,
            s if s >= 60 => TrendSignal::Moderate,
            s if s >= 45 => TrendSignal::Weak,
            _ => TrendSignal::Down,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            TrendSignal::Strong | TrendSignal::Moderate => "🟢",
            TrendSignal::Weak => "🟡",
            TrendSignal::Down => "🔴",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendSignal::Strong => "strong",
            TrendSignal::Moderate => "moderate",
            TrendSignal::Weak => "weak",
            TrendSignal::Down => "down",
        }
    }
}

/// Scored ticker, ready for ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub ticker: String,
    pub score: u8, // 0 to 100
    pub current_price: f64,
    pub price_change_percent: f64,
    pub indicators: IndicatorSet,
    pub trend_signal: TrendSignal,
    pub trend_emoji: String,
    /// Last 30 closes, oldest first
    pub sparkline: Vec<f64>,
}

/// Outcome of scoring one series
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Scored(ScoreResult),
    /// Too few closes to score; carries how many were available
    InsufficientData { ticker: String, available: usize },
}

impl Assessment {
    pub fn ticker(&self) -> &str {
        match self {
            Assessment::Scored(result) => &result.ticker,
            Assessment::InsufficientData { ticker, .. } => ticker,
        }
    }

    pub fn score(&self) -> u8 {
        match self {
            Assessment::Scored(result) => result.score,
            Assessment::InsufficientData { .. } => 0,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Assessment::InsufficientData { .. })
    }
}

/// Per-ticker failure recorded during a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub ticker: String,
    pub message: String,
}

/// Result of one scan request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scanned_at: DateTime<Utc>,
    /// Descending by score; ties keep request order
    pub ranked: Vec<ScoreResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ScanFailure>,
}
