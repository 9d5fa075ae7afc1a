/// Average True Range
///
/// Wilder average of the true range, seeded with the plain mean of the first
/// `period` ranges. Needs `period` candles.

use super::{true_ranges, wilder_average_series};
use crate::models::Candle;

pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    wilder_average_series(&true_ranges(candles), period)
        .last()
        .copied()
}

/// ATR as a percentage of the latest close
pub fn calculate_atr_percent(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = calculate_atr(candles, period)?;
    let close = candles.last()?.close;
    (close != 0.0).then(|| atr / close * 100.0)
}
