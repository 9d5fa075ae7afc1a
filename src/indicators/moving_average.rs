/// Simple and exponential moving averages over closing prices

/// Mean of the last `period` values
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Latest EMA; see [`calculate_ema_series`]
pub fn calculate_ema(values: &[f64], period: usize) -> Option<f64> {
    calculate_ema_series(values, period).last().copied()
}

/// EMA with `alpha = 2 / (period + 1)`, seeded with the first value.
///
/// Reported from index `period - 1` on, so the result has
/// `len - period + 1` entries (empty when `len < period`).
pub fn calculate_ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut ema = values[0];
    let mut series = Vec::with_capacity(values.len() - period + 1);

    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            ema += alpha * (value - ema);
        }
        if i + 1 >= period {
            series.push(ema);
        }
    }
    series
}
