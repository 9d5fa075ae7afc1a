use super::moving_average::calculate_ema_series;

/// MACD line, signal line and histogram at the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    /// Fast EMA - slow EMA
    pub macd: f64,
    /// EMA of the MACD line
    pub signal: f64,
    /// MACD - signal
    pub histogram: f64,
}

/// Moving Average Convergence Divergence
///
/// Needs `slow_period + signal_period - 1` prices so the signal EMA can be seeded.
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<MacdResult> {
    if fast_period == 0 || fast_period >= slow_period || signal_period == 0 {
        return None;
    }
    if prices.len() < slow_period + signal_period - 1 {
        return None;
    }

    let fast = calculate_ema_series(prices, fast_period);
    let slow = calculate_ema_series(prices, slow_period);

    // fast starts (slow - fast) bars earlier than slow
    let offset = slow_period - fast_period;
    let macd_line: Vec<f64> = slow
        .iter()
        .enumerate()
        .map(|(i, slow_ema)| fast[i + offset] - slow_ema)
        .collect();

    let signal = *calculate_ema_series(&macd_line, signal_period).last()?;
    let macd = *macd_line.last()?;

    Some(MacdResult {
        macd,
        signal,
        histogram: macd - signal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macd_uptrend_positive() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 1.5).collect();
        let result = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!(result.macd > 0.0);
        assert!((result.histogram - (result.macd - result.signal)).abs() < 1e-12);
    }

    #[test]
    fn test_macd_accelerating_decline_negative_histogram() {
        let prices: Vec<f64> = (0..60).map(|i| 500.0 - (i * i) as f64 * 0.1).collect();
        let result = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert!(result.macd < 0.0);
        assert!(result.histogram < 0.0);
    }

    #[test]
    fn test_macd_flat_is_zero() {
        let prices = vec![100.0; 40];
        let result = calculate_macd(&prices, 12, 26, 9).unwrap();
        assert_eq!(result.macd, 0.0);
        assert_eq!(result.histogram, 0.0);
    }

    #[test]
    fn test_macd_insufficient_data() {
        let prices = vec![100.0; 33];
        assert!(calculate_macd(&prices, 12, 26, 9).is_none());
        let prices = vec![100.0; 34];
        assert!(calculate_macd(&prices, 12, 26, 9).is_some());
    }
}
