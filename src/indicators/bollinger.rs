use super::moving_average::calculate_sma;

/// Bollinger Bands at the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    /// SMA of the window
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// Band width as a percentage of the middle band
    pub fn width_pct(&self) -> Option<f64> {
        if self.middle == 0.0 {
            return None;
        }
        Some((self.upper - self.lower) / self.middle * 100.0)
    }
}

/// Calculate bands `std_dev` population standard deviations around the SMA
pub fn calculate_bollinger_bands(prices: &[f64], period: usize, std_dev: f64) -> Option<BollingerBands> {
    let middle = calculate_sma(prices, period)?;
    let window = &prices[prices.len() - period..];

    let variance = window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let band = variance.sqrt() * std_dev;

    Some(BollingerBands {
        upper: middle + band,
        middle,
        lower: middle - band,
    })
}
