/// Support/resistance and retracement levels
use crate::models::Candle;

/// Highest high and lowest low of the last `period` candles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub high: f64,
    pub low: f64,
}

/// Classic floor-trader pivots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotPoints {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub s1: f64,
    pub s2: f64,
}

/// Retracements measured down from the high
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibonacciLevels {
    pub level_236: f64,
    pub level_382: f64,
    pub level_500: f64,
    pub level_618: f64,
}

pub fn calculate_range(candles: &[Candle], period: usize) -> Option<PriceRange> {
    if period == 0 || candles.is_empty() {
        return None;
    }
    let recent = &candles[candles.len().saturating_sub(period)..];
    Some(PriceRange {
        high: recent.iter().map(|c| c.high).fold(f64::MIN, f64::max),
        low: recent.iter().map(|c| c.low).fold(f64::MAX, f64::min),
    })
}

/// Pivots from the previous session's high, low and close
pub fn calculate_pivots(candles: &[Candle]) -> Option<PivotPoints> {
    if candles.len() < 2 {
        return None;
    }
    let prev = &candles[candles.len() - 2];
    let pivot = (prev.high + prev.low + prev.close) / 3.0;
    let spread = prev.high - prev.low;

    Some(PivotPoints {
        pivot,
        r1: 2.0 * pivot - prev.low,
        r2: pivot + spread,
        s1: 2.0 * pivot - prev.high,
        s2: pivot - spread,
    })
}

/// Levels over the whole series' high/low
pub fn calculate_fibonacci(candles: &[Candle]) -> Option<FibonacciLevels> {
    let range = calculate_range(candles, candles.len())?;
    let diff = range.high - range.low;

    Some(FibonacciLevels {
        level_236: range.high - diff * 0.236,
        level_382: range.high - diff * 0.382,
        level_500: range.high - diff * 0.5,
        level_618: range.high - diff * 0.618,
    })
}
