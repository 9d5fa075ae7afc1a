/// Relative Strength Index with Wilder smoothing
///
/// Average gain and loss are exponential means with `alpha = 1/period`.
/// The first close has no predecessor and counts as a zero change, so the
/// means start at zero and `period` closes are enough.

use std::iter;

use super::wilder_smooth;

/// Latest RSI, or `None` for short or perfectly flat series
pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let changes = iter::once(0.0).chain(closes.windows(2).map(|pair| pair[1] - pair[0]));
    let (gains, losses): (Vec<f64>, Vec<f64>) = changes
        .map(|change| (change.max(0.0), (-change).max(0.0)))
        .unzip();

    let avg_gain = wilder_smooth(&gains, period)?;
    let avg_loss = wilder_smooth(&losses, period)?;

    match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => None,
        (_, true) => Some(100.0),
        _ => Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_period_closes() {
        let closes: Vec<f64> = (0..13).map(|i| 100.0 + i as f64).collect();
        assert!(calculate_rsi(&closes, 14).is_none());

        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(calculate_rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn test_steady_decline_is_zero() {
        let closes: Vec<f64> = (0..40).map(|i| 500.0 - 3.0 * i as f64).collect();
        assert_eq!(calculate_rsi(&closes, 14), Some(0.0));
    }

    #[test]
    fn test_flat_series_has_no_rsi() {
        assert!(calculate_rsi(&[250.0; 30], 14).is_none());
    }

    #[test]
    fn test_alternating_moves_near_fifty() {
        let closes: Vec<f64> = (0..80)
            .map(|i| if i % 2 == 0 { 1_000.0 } else { 1_010.0 })
            .collect();
        let rsi = calculate_rsi(&closes, 14).unwrap();
        assert!((rsi - 50.0).abs() < 5.0, "got {:.2}", rsi);
    }

    #[test]
    fn test_known_value() {
        // alpha 1/2: gains [0, 2, 0] -> 0, 1, 0.5; losses [0, 0, 1] -> 0, 0, 0.5
        let rsi = calculate_rsi(&[100.0, 102.0, 101.0], 2).unwrap();
        assert!((rsi - 50.0).abs() < 1e-9);

        // a lone rise after the zero seed: gains 0 -> 2, losses stay 0
        assert_eq!(calculate_rsi(&[100.0, 102.0], 2), Some(100.0));
    }
}
