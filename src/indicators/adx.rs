/// Average Directional Index
///
/// Trend strength on a 0-100 scale regardless of direction; above 25 reads
/// as a trending market. +DI and -DI give the direction.

use super::{true_ranges, wilder_average_series};
use crate::models::Candle;

/// Directional index reading for the latest candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxReading {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// +DM/-DM for each consecutive pair of candles
fn directional_moves(candles: &[Candle]) -> (Vec<f64>, Vec<f64>) {
    candles
        .windows(2)
        .map(|pair| {
            let up = pair[1].high - pair[0].high;
            let down = pair[0].low - pair[1].low;
            let plus = if up > down && up > 0.0 { up } else { 0.0 };
            let minus = if down > up && down > 0.0 { down } else { 0.0 };
            (plus, minus)
        })
        .unzip()
}

/// `None` with fewer than `2 * period` candles: `period` moves seed the
/// smoothed ranges and `period` DX values seed the ADX
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<AdxReading> {
    if period == 0 || candles.len() < 2 * period {
        return None;
    }

    // ranges aligned with the moves, i.e. from the second candle on
    let ranges = &true_ranges(candles)[1..];
    let (plus_dm, minus_dm) = directional_moves(candles);

    let smoothed_tr = wilder_average_series(ranges, period);
    let smoothed_plus = wilder_average_series(&plus_dm, period);
    let smoothed_minus = wilder_average_series(&minus_dm, period);

    let di: Vec<(f64, f64)> = smoothed_tr
        .iter()
        .zip(smoothed_plus.iter().zip(&smoothed_minus))
        .map(|(tr, (plus, minus))| {
            if *tr > 0.0 {
                (plus / tr * 100.0, minus / tr * 100.0)
            } else {
                (0.0, 0.0)
            }
        })
        .collect();

    let dx: Vec<f64> = di
        .iter()
        .map(|(plus, minus)| {
            let sum = plus + minus;
            if sum > 0.0 {
                (plus - minus).abs() / sum * 100.0
            } else {
                0.0
            }
        })
        .collect();

    let adx = *wilder_average_series(&dx, period).last()?;
    let (plus_di, minus_di) = *di.last()?;

    Some(AdxReading {
        adx,
        plus_di,
        minus_di,
    })
}
