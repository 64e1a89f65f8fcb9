/// Default RSI lookback
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST_PERIOD: usize = 12;
pub const MACD_SLOW_PERIOD: usize = 26;
pub const MACD_SIGNAL_PERIOD: usize = 9;

/// Relative Strength Index over the last `period` price changes.
///
/// Uses a plain average of gains and losses in the window (no Wilder
/// smoothing). A window without losses is pinned to 100.
pub fn rsi(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    for i in data.len() - period..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// Exponential Moving Average at every bar from `period - 1` onward.
///
/// `ema_series(data, n)[i]` is the EMA of `data[..n + i]`, seeded with the SMA
/// of the first `n` values.
pub fn ema_series(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(data.len() - period + 1);

    let mut ema = data[..period].iter().sum::<f64>() / period as f64;
    result.push(ema);

    for price in &data[period..] {
        ema += (price - ema) * multiplier;
        result.push(ema);
    }

    result
}

/// Exponential Moving Average at the last bar
pub fn ema(data: &[f64], period: usize) -> Option<f64> {
    ema_series(data, period).last().copied()
}

/// MACD (Moving Average Convergence Divergence)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: Option<f64>,
    pub histogram: f64,
}

/// MACD(12, 26, 9) at the last bar.
///
/// The signal line is the 9-period EMA of the MACD line, where the MACD line
/// holds EMA12 - EMA26 for every prefix of at least 27 bars. Both EMA series
/// are built once, so each prefix value is read off instead of recomputed.
pub fn macd(data: &[f64]) -> Option<MacdResult> {
    let fast = ema_series(data, MACD_FAST_PERIOD);
    let slow = ema_series(data, MACD_SLOW_PERIOD);

    let macd = fast.last()? - slow.last()?;

    let macd_line: Vec<f64> = (MACD_SLOW_PERIOD + 1..=data.len())
        .map(|len| fast[len - MACD_FAST_PERIOD] - slow[len - MACD_SLOW_PERIOD])
        .collect();

    let signal = ema(&macd_line, MACD_SIGNAL_PERIOD);
    let histogram = signal.map(|s| macd - s).unwrap_or(0.0);

    Some(MacdResult {
        macd,
        signal,
        histogram,
    })
}

/// Latest volume relative to the mean of the trailing `lookback` volumes.
pub fn volume_ratio(volume: &[f64], lookback: usize) -> Option<f64> {
    let current = *volume.last()?;
    let window = analysis_core::stats::tail(volume, lookback);
    let avg = analysis_core::stats::mean(window);
    if avg <= 0.0 || !avg.is_finite() {
        return None;
    }
    Some(current / avg)
}
