/// Technical analysis over a daily price series
///
/// Sections are produced lazily in a fixed order: Price, Moving Averages,
/// Momentum, Trend Strength, Volatility, Volume, Support / Resistance,
/// Fibonacci Levels and the Overall Signal summary.
///
/// Seven checks feed the overall tally: price vs SMA 50, price vs SMA 200,
/// RSI, Stochastic, MACD histogram, price vs Bollinger midline and OBV trend.
/// ADX and the volume ratio are display-only. The tally is asymmetric:
/// a neutral RSI counts as bearish, and so does an oversold Stochastic.

use crate::error::AnalysisError;
use crate::indicators::{
    calculate_adx, calculate_atr, calculate_atr_percent, calculate_average_volume,
    calculate_bollinger_bands, calculate_ema, calculate_fibonacci, calculate_macd,
    calculate_pivots, calculate_range, calculate_rsi, calculate_sma, calculate_stochastic,
    calculate_volume_ratio, is_obv_rising, AdxReading,
};
use crate::market::Market;
use crate::models::{PriceSeries, Row, Section, Signal};
use crate::provider::{DataProvider, PricePeriod};
use crate::Result;

use super::format::{self, NOT_AVAILABLE};

pub const TALLIED_CHECKS: u32 = 7;
const BULLISH_THRESHOLD: u32 = 5;
const RANGE_PERIOD: usize = 20;
const OBV_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Price,
    MovingAverages,
    Momentum,
    TrendStrength,
    Volatility,
    Volume,
    SupportResistance,
    Fibonacci,
    Overall,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Price => Stage::MovingAverages,
            Stage::MovingAverages => Stage::Momentum,
            Stage::Momentum => Stage::TrendStrength,
            Stage::TrendStrength => Stage::Volatility,
            Stage::Volatility => Stage::Volume,
            Stage::Volume => Stage::SupportResistance,
            Stage::SupportResistance => Stage::Fibonacci,
            Stage::Fibonacci => Stage::Overall,
            Stage::Overall | Stage::Done => Stage::Done,
        }
    }
}

/// Independent bullish/bearish counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub bullish: u32,
    pub bearish: u32,
}

impl Tally {
    fn record(&mut self, bullish: bool) {
        if bullish {
            self.bullish += 1;
        } else {
            self.bearish += 1;
        }
    }
}

/// Moving-average crossover state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cross {
    Golden,
    Death,
    Above,
    Below,
}

impl Cross {
    pub fn label(&self) -> &'static str {
        match self {
            Cross::Golden => "GOLDEN CROSS",
            Cross::Death => "DEATH CROSS",
            Cross::Above => "SMA 50 > SMA 200",
            Cross::Below => "SMA 50 < SMA 200",
        }
    }

    pub fn signal(&self) -> Signal {
        match self {
            Cross::Golden | Cross::Above => Signal::Bullish,
            Cross::Death | Cross::Below => Signal::Bearish,
        }
    }
}

/// Compare yesterday's SMA 50/200 ordering with today's
pub fn classify_cross(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Cross {
    if prev_fast <= prev_slow && fast > slow {
        Cross::Golden
    } else if prev_fast >= prev_slow && fast < slow {
        Cross::Death
    } else if fast > slow {
        Cross::Above
    } else {
        Cross::Below
    }
}

/// RSI zone; both bounds are strict
pub fn classify_rsi(rsi: f64) -> (&'static str, Signal) {
    if rsi > 70.0 {
        ("Overbought", Signal::Bearish)
    } else if rsi < 30.0 {
        ("Oversold", Signal::Bullish)
    } else {
        ("Neutral", Signal::Neutral)
    }
}

/// Only the 40-70 band counts as bullish momentum
pub fn rsi_is_bullish(rsi: f64) -> bool {
    rsi > 40.0 && rsi < 70.0
}

pub fn classify_stochastic(k: f64) -> (&'static str, Signal) {
    if k > 80.0 {
        ("Overbought", Signal::Bearish)
    } else if k < 20.0 {
        ("Oversold", Signal::Bullish)
    } else {
        ("Neutral", Signal::Neutral)
    }
}

/// Either extreme tallies bearish
pub fn stochastic_is_bullish(k: f64) -> bool {
    (20.0..=80.0).contains(&k)
}

pub fn classify_volume_ratio(ratio: f64) -> Signal {
    if ratio > 1.2 {
        Signal::Bullish
    } else if ratio < 0.5 {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

/// "BULLISH" at 5 bullish checks, "BEARISH" at 5 bearish ones
pub fn overall_signal(tally: Tally) -> (&'static str, Signal) {
    if tally.bullish >= BULLISH_THRESHOLD {
        ("BULLISH", Signal::Bullish)
    } else if tally.bearish >= BULLISH_THRESHOLD {
        ("BEARISH", Signal::Bearish)
    } else {
        ("NEUTRAL", Signal::Neutral)
    }
}

/// Lazy technical analysis over one series
#[derive(Debug, Clone)]
pub struct TechnicalAnalysis {
    series: PriceSeries,
    closes: Vec<f64>,
    currency: &'static str,
    stage: Stage,
    tally: Tally,
}

/// Fetch one year of daily bars and prepare the section sequence.
/// Fetch failures surface here, before any section is produced.
pub async fn technical_analysis<P: DataProvider>(
    provider: &P,
    symbol: &str,
    market: Market,
) -> Result<TechnicalAnalysis> {
    let series = provider
        .fetch_price_series(symbol, market, PricePeriod::OneYear)
        .await?;
    TechnicalAnalysis::new(series, market)
}

impl TechnicalAnalysis {
    pub fn new(series: PriceSeries, market: Market) -> Result<Self> {
        if series.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "{} has {} price points, need at least 2",
                series.symbol(),
                series.len()
            )));
        }

        Ok(Self {
            closes: series.closes(),
            series,
            currency: market.currency(),
            stage: Stage::Price,
            tally: Tally::default(),
        })
    }

    /// Counters accumulated by the sections produced so far
    pub fn tally(&self) -> Tally {
        self.tally
    }

    fn latest(&self) -> f64 {
        self.closes[self.closes.len() - 1]
    }

    fn price_or_na(&self, value: Option<f64>) -> String {
        value
            .map(|v| format::price(self.currency, v))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    fn price_section(&self) -> Section {
        let latest = self.latest();
        let prev_close = self.closes[self.closes.len() - 2];
        let change = latest - prev_close;

        let change_pct = if prev_close != 0.0 {
            let pct = change / prev_close * 100.0;
            if change >= 0.0 {
                format!("+{:.2}%", pct)
            } else {
                format!("{:.2}%", pct)
            }
        } else {
            NOT_AVAILABLE.to_string()
        };

        Section::new(
            "Price",
            vec![
                Row::plain("Current Price", format::price(self.currency, latest)),
                Row::signalled(
                    "Change",
                    format!("{} ({})", format::signed(change, 2), change_pct),
                    Signal::from_bool(change >= 0.0),
                ),
            ],
        )
    }

    fn moving_averages_section(&mut self) -> Section {
        let latest = self.latest();
        let closes = &self.closes;
        let previous = &closes[..closes.len() - 1];

        let sma_20 = calculate_sma(closes, 20);
        let sma_50 = calculate_sma(closes, 50);
        let sma_200 = calculate_sma(closes, 200);
        let ema_12 = calculate_ema(closes, 12);
        let ema_26 = calculate_ema(closes, 26);

        // without a prior-day pair the cross falls back to today's ordering
        let cross = match (sma_50, sma_200) {
            (Some(fast), Some(slow)) => Some(
                match (calculate_sma(previous, 50), calculate_sma(previous, 200)) {
                    (Some(prev_fast), Some(prev_slow)) => {
                        classify_cross(prev_fast, prev_slow, fast, slow)
                    }
                    _ if fast > slow => Cross::Above,
                    _ => Cross::Below,
                },
            ),
            _ => None,
        };

        let above = |sma: Option<f64>| sma.map(|v| latest > v);
        let above_50 = above(sma_50);
        let above_200 = above(sma_200);
        for check in [above_50, above_200].into_iter().flatten() {
            self.tally.record(check);
        }

        let sma_row = |label: &str, sma: Option<f64>| {
            Row::new(label, self.price_or_na(sma), above(sma).map(Signal::from_bool))
        };

        let rows = vec![
            sma_row("SMA 20", sma_20),
            sma_row("SMA 50", sma_50),
            sma_row("SMA 200", sma_200),
            Row::plain("EMA 12", self.price_or_na(ema_12)),
            Row::plain("EMA 26", self.price_or_na(ema_26)),
            match cross {
                Some(cross) => Row::signalled("Cross Signal", cross.label(), cross.signal()),
                None => Row::plain("Cross Signal", NOT_AVAILABLE),
            },
        ];

        Section::new("Moving Averages", rows)
    }

    fn momentum_section(&mut self) -> Section {
        let mut rows = Vec::with_capacity(6);

        match calculate_rsi(&self.closes, 14) {
            Some(rsi) => {
                let (zone, signal) = classify_rsi(rsi);
                self.tally.record(rsi_is_bullish(rsi));
                rows.push(Row::signalled("RSI (14)", format!("{:.2} ({})", rsi, zone), signal));
            }
            None => rows.push(Row::plain("RSI (14)", NOT_AVAILABLE)),
        }

        match calculate_stochastic(self.series.candles(), 14, 3) {
            Some(stoch) => {
                let (zone, signal) = classify_stochastic(stoch.k);
                self.tally.record(stochastic_is_bullish(stoch.k));
                rows.push(Row::signalled(
                    "Stochastic %K",
                    format!("{:.2} ({})", stoch.k, zone),
                    signal,
                ));
                rows.push(Row::plain("Stochastic %D", format!("{:.2}", stoch.d)));
            }
            None => {
                rows.push(Row::plain("Stochastic %K", NOT_AVAILABLE));
                rows.push(Row::plain("Stochastic %D", NOT_AVAILABLE));
            }
        }

        match calculate_macd(&self.closes, 12, 26, 9) {
            Some(macd) => {
                let rising = macd.histogram > 0.0;
                self.tally.record(rising);
                rows.push(Row::plain("MACD", format!("{:.2}", macd.macd)));
                rows.push(Row::plain("MACD Signal", format!("{:.2}", macd.signal)));
                rows.push(Row::signalled(
                    "MACD Histogram",
                    format!(
                        "{:.2} ({})",
                        macd.histogram,
                        if rising { "Bullish" } else { "Bearish" }
                    ),
                    Signal::from_bool(rising),
                ));
            }
            None => {
                for label in ["MACD", "MACD Signal", "MACD Histogram"] {
                    rows.push(Row::plain(label, NOT_AVAILABLE));
                }
            }
        }

        Section::new("Momentum", rows)
    }

    fn trend_strength_section(&self) -> Section {
        let row = match calculate_adx(self.series.candles(), 14) {
            Some(AdxReading { adx, .. }) if adx > 25.0 => Row::signalled(
                "ADX (14)",
                format!("{:.2} (Strong Trend)", adx),
                Signal::Bullish,
            ),
            Some(AdxReading { adx, .. }) => Row::signalled(
                "ADX (14)",
                format!("{:.2} (Weak/No Trend)", adx),
                Signal::Neutral,
            ),
            None => Row::plain("ADX (14)", NOT_AVAILABLE),
        };
        Section::new("Trend Strength", vec![row])
    }

    fn volatility_section(&mut self) -> Section {
        let latest = self.latest();
        let mut rows = Vec::with_capacity(6);

        let candles = self.series.candles();
        rows.push(match (calculate_atr(candles, 14), calculate_atr_percent(candles, 14)) {
            (Some(atr), Some(pct)) => Row::plain(
                "ATR (14)",
                format!("{} ({:.2}%)", format::price(self.currency, atr), pct),
            ),
            _ => Row::plain("ATR (14)", NOT_AVAILABLE),
        });

        match calculate_bollinger_bands(&self.closes, 20, 2.0) {
            Some(bands) => {
                self.tally.record(latest > bands.middle);

                let (position, signal) = if latest >= bands.upper {
                    ("At/Above Upper Band", Signal::Bearish)
                } else if latest <= bands.lower {
                    ("At/Below Lower Band", Signal::Bullish)
                } else {
                    ("Within Bands", Signal::Neutral)
                };

                rows.push(Row::plain("Bollinger Upper", format::price(self.currency, bands.upper)));
                rows.push(Row::plain("Bollinger Mid", format::price(self.currency, bands.middle)));
                rows.push(Row::plain("Bollinger Lower", format::price(self.currency, bands.lower)));
                rows.push(Row::plain(
                    "BB Width",
                    bands
                        .width_pct()
                        .map(|w| format!("{:.2}%", w))
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                ));
                rows.push(Row::signalled("BB Signal", position, signal));
            }
            None => {
                for label in [
                    "Bollinger Upper",
                    "Bollinger Mid",
                    "Bollinger Lower",
                    "BB Width",
                    "BB Signal",
                ] {
                    rows.push(Row::plain(label, NOT_AVAILABLE));
                }
            }
        }

        Section::new("Volatility", rows)
    }

    fn volume_section(&mut self) -> Section {
        let candles = self.series.candles();
        let current_volume = candles[candles.len() - 1].volume;

        let avg_volume = calculate_average_volume(candles, RANGE_PERIOD);
        let ratio_row = match calculate_volume_ratio(candles, RANGE_PERIOD) {
            Some(ratio) => Row::signalled(
                "Volume Ratio",
                format!("{:.2}x", ratio),
                classify_volume_ratio(ratio),
            ),
            None => Row::plain("Volume Ratio", NOT_AVAILABLE),
        };

        let obv_row = match is_obv_rising(candles, OBV_LOOKBACK) {
            Some(rising) => {
                self.tally.record(rising);
                Row::signalled(
                    "OBV Trend (5d)",
                    if rising { "Rising" } else { "Falling" },
                    Signal::from_bool(rising),
                )
            }
            None => Row::plain("OBV Trend (5d)", NOT_AVAILABLE),
        };

        Section::new(
            "Volume",
            vec![
                Row::plain("Current Volume", format::count(current_volume)),
                Row::plain(
                    "20-Day Avg Volume",
                    avg_volume
                        .map(format::count)
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                ),
                ratio_row,
                obv_row,
            ],
        )
    }

    fn support_resistance_section(&self) -> Section {
        let candles = self.series.candles();
        let mut rows = Vec::with_capacity(5);

        if let Some(range) = calculate_range(candles, RANGE_PERIOD) {
            rows.push(Row::plain("20-Day Support", format::price(self.currency, range.low)));
            rows.push(Row::plain("20-Day Resistance", format::price(self.currency, range.high)));
        }

        if let Some(pivots) = calculate_pivots(candles) {
            let pair = |a: f64, b: f64| {
                format!(
                    "{} / {}",
                    format::price(self.currency, a),
                    format::price(self.currency, b)
                )
            };
            rows.push(Row::plain("Pivot Point", format::price(self.currency, pivots.pivot)));
            rows.push(Row::plain("R1 / R2", pair(pivots.r1, pivots.r2)));
            rows.push(Row::plain("S1 / S2", pair(pivots.s1, pivots.s2)));
        }

        Section::new("Support / Resistance", rows)
    }

    fn fibonacci_section(&self) -> Section {
        let rows = match calculate_fibonacci(self.series.candles()) {
            Some(fib) => [
                ("23.6%", fib.level_236),
                ("38.2%", fib.level_382),
                ("50.0%", fib.level_500),
                ("61.8%", fib.level_618),
            ]
            .into_iter()
            .map(|(label, level)| Row::plain(label, format::price(self.currency, level)))
            .collect(),
            None => Vec::new(),
        };
        Section::new("Fibonacci Levels (52-wk)", rows)
    }

    fn overall_section(&self) -> Section {
        let (label, signal) = overall_signal(self.tally);
        Section::summary(
            "Overall Signal",
            vec![Row::signalled(
                "Signal",
                format!("{} ({}/{})", label, self.tally.bullish, TALLIED_CHECKS),
                signal,
            )],
        )
    }
}

impl Iterator for TechnicalAnalysis {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        let section = match self.stage {
            Stage::Price => self.price_section(),
            Stage::MovingAverages => self.moving_averages_section(),
            Stage::Momentum => self.momentum_section(),
            Stage::TrendStrength => self.trend_strength_section(),
            Stage::Volatility => self.volatility_section(),
            Stage::Volume => self.volume_section(),
            Stage::SupportResistance => self.support_resistance_section(),
            Stage::Fibonacci => self.fibonacci_section(),
            Stage::Overall => self.overall_section(),
            Stage::Done => return None,
        };
        self.stage = self.stage.next();
        Some(section)
    }
}
