/// Volume analysis
///
/// Average volume, today's volume relative to that average, and
/// On-Balance Volume for accumulation/distribution trend

use crate::models::Candle;

/// Calculate average volume over the last `period` candles
pub fn calculate_average_volume(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }

    let recent_candles = &candles[candles.len() - period..];
    let total_volume: f64 = recent_candles.iter().map(|c| c.volume).sum();
    Some(total_volume / period as f64)
}

/// Latest volume divided by the `period`-day average (average includes today)
///
/// Returns 0.0 when the average is zero
pub fn calculate_volume_ratio(candles: &[Candle], period: usize) -> Option<f64> {
    let avg_volume = calculate_average_volume(candles, period)?;
    let current_volume = candles.last()?.volume;

    if avg_volume > 0.0 {
        Some(current_volume / avg_volume)
    } else {
        Some(0.0)
    }
}

/// On-Balance Volume series, one value per candle
///
/// A down close subtracts the day's volume, anything else adds it.
pub fn calculate_obv_series(candles: &[Candle]) -> Vec<f64> {
    let mut obv = 0.0;
    let mut prev_close: Option<f64> = None;

    candles
        .iter()
        .map(|candle| {
            match prev_close {
                Some(prev) if candle.close < prev => obv -= candle.volume,
                _ => obv += candle.volume,
            }
            prev_close = Some(candle.close);
            obv
        })
        .collect()
}

/// Whether OBV is above its value `lookback` positions from the end
///
/// `lookback = 5` compares against the fifth-most-recent value, which is
/// four sessions before today.
pub fn is_obv_rising(candles: &[Candle], lookback: usize) -> Option<bool> {
    if lookback < 2 {
        return None;
    }
    let obv = calculate_obv_series(candles);
    if obv.len() < lookback {
        return None;
    }

    let current = obv[obv.len() - 1];
    let earlier = obv[obv.len() - lookback];
    Some(current > earlier)
}
