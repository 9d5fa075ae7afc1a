use crate::models::{Candle, PriceSeries};
use crate::Result;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Price path shapes for synthetic daily series
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TrendProfile {
    /// +0.4% daily drift with ±1% noise
    Uptrend,
    /// -0.4% daily drift with ±1% noise
    Downtrend,
    /// Mean-reverting walk around the base price
    Sideways,
    /// ±4% daily swings, floored at half the base price
    Volatile,
}

/// Seeded generator of daily OHLCV bars on weekdays
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Same seed, same series
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 1_500.0,
            base_volume: 2_000_000.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate `num_days` trading days starting at the first weekday on or after `start`
    pub fn generate(
        &mut self,
        symbol: &str,
        start: NaiveDate,
        num_days: usize,
        profile: TrendProfile,
    ) -> Result<PriceSeries> {
        let mut candles = Vec::with_capacity(num_days);
        let mut price = self.base_price;

        let trading_days = start
            .iter_days()
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .take(num_days);

        for date in trading_days {
            price = self.step(price, profile);
            candles.push(self.create_candle(price, date));
        }

        PriceSeries::new(symbol, candles)
    }

    fn step(&mut self, price: f64, profile: TrendProfile) -> f64 {
        match profile {
            TrendProfile::Uptrend => price * (1.0 + 0.004 + self.rng.gen_range(-0.01..0.01)),
            TrendProfile::Downtrend => price * (1.0 - 0.004 + self.rng.gen_range(-0.01..0.01)),
            TrendProfile::Sideways => {
                let reversion = (self.base_price - price) * 0.1;
                price + reversion + price * self.rng.gen_range(-0.015..0.015)
            }
            TrendProfile::Volatile => {
                let next = price * (1.0 + self.rng.gen_range(-0.04..0.04));
                next.max(self.base_price * 0.5)
            }
        }
    }

    fn create_candle(&mut self, close: f64, date: NaiveDate) -> Candle {
        let range_pct = 0.012;

        let high = close * (1.0 + self.rng.gen_range(0.0..range_pct));
        let low = close * (1.0 - self.rng.gen_range(0.0..range_pct));
        let open = (close * (1.0 + self.rng.gen_range(-range_pct..range_pct))).clamp(low, high);
        let volume = (self.base_volume * self.rng.gen_range(0.6..1.4)).round();

        Candle {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// One-shot helper over [`SyntheticDataGenerator`]
pub fn generate_series(
    symbol: &str,
    start: NaiveDate,
    num_days: usize,
    profile: TrendProfile,
    seed: u64,
) -> Result<PriceSeries> {
    SyntheticDataGenerator::new(seed).generate(symbol, start, num_days, profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_generate_uptrend() {
        let series = generate_series("UP", start(), 250, TrendProfile::Uptrend, 42).unwrap();
        assert_eq!(series.len(), 250);

        let closes = series.closes();
        assert!(
            closes[closes.len() - 1] > closes[0],
            "Uptrend should end higher: {} -> {}",
            closes[0],
            closes[closes.len() - 1]
        );
    }

    #[test]
    fn test_generate_downtrend() {
        let series = generate_series("DOWN", start(), 250, TrendProfile::Downtrend, 42).unwrap();
        let closes = series.closes();
        assert!(closes[closes.len() - 1] < closes[0]);
    }

    #[test]
    fn test_sideways_stays_near_base() {
        let series = generate_series("FLAT", start(), 250, TrendProfile::Sideways, 42).unwrap();
        for close in series.closes() {
            assert!(close > 1_500.0 * 0.85 && close < 1_500.0 * 1.15, "{}", close);
        }
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = generate_series("X", start(), 50, TrendProfile::Volatile, 7).unwrap();
        let b = generate_series("X", start(), 50, TrendProfile::Volatile, 7).unwrap();
        let c = generate_series("X", start(), 50, TrendProfile::Volatile, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_weekdays_only_and_increasing() {
        let series = generate_series("X", start(), 30, TrendProfile::Uptrend, 1).unwrap();
        for window in series.candles().windows(2) {
            assert!(window[1].date > window[0].date);
        }
        assert!(series
            .candles()
            .iter()
            .all(|c| !matches!(c.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn test_ohlc_consistency() {
        let series = generate_series("X", start(), 100, TrendProfile::Volatile, 3).unwrap();
        for candle in series.candles() {
            assert!(candle.high >= candle.close);
            assert!(candle.high >= candle.open);
            assert!(candle.low <= candle.close);
            assert!(candle.low <= candle.open);
        }
    }
}
