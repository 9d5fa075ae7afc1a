use crate::models::Candle;

/// Stochastic oscillator at the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticResult {
    /// Raw %K: close position within the `k_period` high/low range
    pub k: f64,
    /// %D: simple average of the last `d_period` %K values
    pub d: f64,
}

/// Calculate %K/%D. A window with no range (high == low) reads 50.
pub fn calculate_stochastic(
    candles: &[Candle],
    k_period: usize,
    d_period: usize,
) -> Option<StochasticResult> {
    if k_period == 0 || d_period == 0 || candles.len() < k_period + d_period - 1 {
        return None;
    }

    let k_values: Vec<f64> = candles
        .windows(k_period)
        .map(|window| {
            let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let close = window[window.len() - 1].close;
            if highest > lowest {
                (close - lowest) / (highest - lowest) * 100.0
            } else {
                50.0
            }
        })
        .collect();

    let k = *k_values.last()?;
    let d = k_values.iter().rev().take(d_period).sum::<f64>() / d_period as f64;

    Some(StochasticResult { k, d })
}
