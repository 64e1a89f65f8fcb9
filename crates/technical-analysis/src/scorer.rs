use analysis_core::stats::{percent_change, round_to, tail};
use analysis_core::{AnalysisError, Assessment, IndicatorSet, MacdValue, PriceSeries, ScoreResult, TrendSignal};

use crate::indicators::{ema, macd, rsi, volume_ratio, RSI_PERIOD};

/// Fewest closes needed before a ticker is scored at all
pub const MIN_SCORING_BARS: usize = 30;
pub const VOLUME_LOOKBACK: usize = 20;
pub const SPARKLINE_LEN: usize = 30;

/// Score a single ticker's history.
///
/// Short series are not an error: they come back as
/// `Assessment::InsufficientData` with an implied score of zero. A series with
/// no usable volume is a scoring failure.
pub fn score_series(series: &PriceSeries) -> Result<Assessment, AnalysisError> {
    let close = &series.close;

    if close.len() < MIN_SCORING_BARS {
        tracing::debug!("{}: only {} closes, skipping indicators", series.ticker, close.len());
        return Ok(Assessment::InsufficientData {
            ticker: series.ticker.clone(),
            available: close.len(),
        });
    }

    let current_price = *close
        .last()
        .ok_or_else(|| AnalysisError::InsufficientData("no closing prices".to_string()))?;

    let indicators = compute_indicators(close, &series.volume, current_price)?;
    let score = composite_score(current_price, &indicators);
    let trend_signal = classify_trend(score);

    let price_change_percent = if close.len() >= 2 {
        percent_change(close[close.len() - 2], current_price)
    } else {
        0.0
    };

    tracing::debug!(
        "{}: score {} ({}), rsi {:?}, volume ratio {:.2}",
        series.ticker,
        score,
        trend_signal.as_str(),
        indicators.rsi,
        indicators.volume_ratio
    );

    Ok(Assessment::Scored(ScoreResult {
        ticker: series.ticker.clone(),
        score,
        current_price: round_to(current_price, 2),
        price_change_percent: round_to(price_change_percent, 2),
        indicators: indicators.rounded(),
        trend_signal,
        trend_emoji: trend_signal.emoji().to_string(),
        sparkline: tail(close, SPARKLINE_LEN).to_vec(),
    }))
}

/// Full-precision indicators for the last bar.
///
/// The EMA windows shrink to `len - 5` on short histories so that a moving
/// average is still available.
pub fn compute_indicators(close: &[f64], volume: &[f64], price: f64) -> Result<IndicatorSet, AnalysisError> {
    let ema_cap = close.len().saturating_sub(5);

    let rsi = rsi(close, RSI_PERIOD);
    let macd = macd(close).map(|m| MacdValue {
        value: m.macd,
        signal: m.signal,
        histogram: m.histogram,
        bullish: m.histogram > 0.0,
    });
    let ema20 = ema(close, 20.min(ema_cap));
    let ema50 = ema(close, 50.min(ema_cap));

    let volume_ratio = volume_ratio(volume, VOLUME_LOOKBACK)
        .ok_or_else(|| AnalysisError::InsufficientData("insufficient volume data".to_string()))?;

    Ok(IndicatorSet {
        rsi,
        macd,
        ema20,
        ema50,
        volume_ratio,
        above_ema20: ema20.is_some_and(|e| price > e),
        above_ema50: ema50.is_some_and(|e| price > e),
    })
}

/// Sum of the RSI, MACD, EMA20, EMA50 and volume buckets (0 to 100).
pub fn composite_score(price: f64, indicators: &IndicatorSet) -> u8 {
    indicators.rsi.map_or(0, rsi_points)
        + indicators.macd.map_or(0, |m| macd_points(m.histogram))
        + indicators.ema20.map_or(0, |e| ema_points(price, e, 1.02, 0.98))
        + indicators.ema50.map_or(0, |e| ema_points(price, e, 1.05, 0.95))
        + volume_points(indicators.volume_ratio)
}

pub fn classify_trend(score: u8) -> TrendSignal {
    TrendSignal::from_score(score)
}

/// 50-65 is the sweet spot. Nothing above 80 scores.
fn rsi_points(rsi: f64) -> u8 {
    if (50.0..=65.0).contains(&rsi) {
        20
    } else if (45.0..50.0).contains(&rsi) || (rsi > 65.0 && rsi <= 70.0) {
        15
    } else if (40.0..45.0).contains(&rsi) || (rsi > 70.0 && rsi <= 80.0) {
        10
    } else if rsi < 40.0 {
        5
    } else {
        0
    }
}

fn macd_points(histogram: f64) -> u8 {
    if histogram > 0.0 {
        25
    } else if histogram > -0.5 {
        15
    } else {
        5
    }
}

/// `upper` marks "well above" the average, `lower` still counts as close to it.
fn ema_points(price: f64, ema: f64, upper: f64, lower: f64) -> u8 {
    if price > ema * upper {
        20
    } else if price > ema {
        15
    } else if price > ema * lower {
        10
    } else {
        5
    }
}

fn volume_points(ratio: f64) -> u8 {
    if ratio > 1.5 {
        15
    } else if ratio > 1.2 {
        12
    } else if ratio > 1.0 {
        8
    } else {
        5
    }
}
