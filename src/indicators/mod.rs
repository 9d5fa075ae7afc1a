// Technical indicators module
// Moving averages, momentum, trend strength, volatility, volume and price levels

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod levels;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod stochastic;
pub mod volume;

pub use adx::{calculate_adx, AdxReading};
pub use atr::{calculate_atr, calculate_atr_percent};
pub use bollinger::{calculate_bollinger_bands, BollingerBands};
pub use levels::{
    calculate_fibonacci, calculate_pivots, calculate_range, FibonacciLevels, PivotPoints,
    PriceRange,
};
pub use macd::{calculate_macd, MacdResult};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma};
pub use rsi::calculate_rsi;
pub use stochastic::{calculate_stochastic, StochasticResult};
pub use volume::{
    calculate_average_volume, calculate_obv_series, calculate_volume_ratio, is_obv_rising,
};

use crate::models::Candle;

/// True range of every candle. The first has no previous close and uses its
/// own high-low range.
pub(crate) fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    let mut prev_close: Option<f64> = None;
    candles
        .iter()
        .map(|candle| {
            let range = candle.high - candle.low;
            let tr = match prev_close {
                Some(close) => range
                    .max((candle.high - close).abs())
                    .max((candle.low - close).abs()),
                None => range,
            };
            prev_close = Some(candle.close);
            tr
        })
        .collect()
}

/// Exponential mean with `alpha = 1/period`, seeded with the first value.
/// `None` with fewer than `period` values.
pub(crate) fn wilder_smooth(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let alpha = 1.0 / period as f64;
    let first = values[0];
    Some(values[1..].iter().fold(first, |avg, v| avg + alpha * (v - avg)))
}

/// Wilder average seeded with the mean of the first `period` values; one
/// output per input from index `period - 1`
pub(crate) fn wilder_average_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let n = period as f64;
    let seed = values[..period].iter().sum::<f64>() / n;
    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);
    for value in &values[period..] {
        let prev = series[series.len() - 1];
        series.push((prev * (n - 1.0) + value) / n);
    }
    series
}
