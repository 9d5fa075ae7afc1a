use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::Result;

pub mod info;
pub mod statements;

pub use info::SnapshotInfo;
pub use statements::{
    FinancialStatements, LineItem, StatementColumn, StatementKind, StatementSet, StatementTable,
};

/// Daily OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Date-ordered daily bars for one symbol.
///
/// Dates are strictly increasing; construction rejects anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    candles: Vec<Candle>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Result<Self> {
        let symbol = symbol.into();
        for window in candles.windows(2) {
            if window[1].date <= window[0].date {
                return Err(AnalysisError::InvalidInput(format!(
                    "{}: candle dates not strictly increasing ({} then {})",
                    symbol, window[0].date, window[1].date
                )));
            }
        }
        Ok(Self { symbol, candles })
    }

    /// Build a series from closes only, one bar per consecutive day.
    /// High/low equal the close; volume is constant.
    pub fn from_closes(symbol: impl Into<String>, start: NaiveDate, closes: &[f64]) -> Self {
        let candles = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| Candle {
                date,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000.0,
            })
            .collect();
        Self {
            symbol: symbol.into(),
            candles,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

/// Direction a displayed value points to. A row with no signal carries `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
    Info,
}

impl Signal {
    pub fn from_bool(bullish: bool) -> Self {
        if bullish {
            Signal::Bullish
        } else {
            Signal::Bearish
        }
    }
}

/// One labelled line of an analysis section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub label: String,
    pub value: String,
    pub signal: Option<Signal>,
}

impl Row {
    pub fn new(label: impl Into<String>, value: impl Into<String>, signal: Option<Signal>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            signal,
        }
    }

    /// Display-only row
    pub fn plain(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(label, value, None)
    }

    pub fn signalled(label: impl Into<String>, value: impl Into<String>, signal: Signal) -> Self {
        Self::new(label, value, Some(signal))
    }

    /// "PASS"/"FAIL" row used by the CAN SLIM letters
    pub fn pass_fail(label: impl Into<String>, passed: bool) -> Self {
        let value = if passed { "PASS" } else { "FAIL" };
        Self::signalled(label, value, Signal::from_bool(passed))
    }
}

/// Named, ordered group of rows produced by an analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub rows: Vec<Row>,
    pub is_summary: bool,
}

impl Section {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
            is_summary: false,
        }
    }

    pub fn summary(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
            is_summary: true,
        }
    }

    pub fn row(&self, label: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.label == label)
    }
}

/// Coarse rating derived from a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Strong,
    Moderate,
    Weak,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Strong => "STRONG",
            Tier::Moderate => "MODERATE",
            Tier::Weak => "WEAK",
        }
    }

    pub fn signal(&self) -> Signal {
        match self {
            Tier::Strong => Signal::Bullish,
            Tier::Moderate => Signal::Neutral,
            Tier::Weak => Signal::Bearish,
        }
    }
}

/// Pass/fail tally across independent boolean checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreCard {
    score: u32,
    max_score: u32,
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one check; returns the condition so callers can reuse it
    pub fn check(&mut self, passed: bool) -> bool {
        self.max_score += 1;
        if passed {
            self.score += 1;
        }
        passed
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    pub fn percent(&self) -> f64 {
        if self.max_score == 0 {
            return 0.0;
        }
        self.score as f64 / self.max_score as f64 * 100.0
    }

    /// STRONG at >= 70% of checks passed, MODERATE at >= 40%
    pub fn tier_by_percent(self) -> Tier {
        let pct = self.percent();
        if pct >= 70.0 {
            Tier::Strong
        } else if pct >= 40.0 {
            Tier::Moderate
        } else {
            Tier::Weak
        }
    }

    /// Tier from absolute pass counts
    pub fn tier_by_count(self, strong_min: u32, moderate_min: u32) -> Tier {
        if self.score >= strong_min {
            Tier::Strong
        } else if self.score >= moderate_min {
            Tier::Moderate
        } else {
            Tier::Weak
        }
    }

    /// "STRONG (7/10)"
    pub fn rating_row(self, label: &str, tier: Tier) -> Row {
        Row::signalled(
            label,
            format!("{} ({}/{})", tier.label(), self.score, self.max_score),
            tier.signal(),
        )
    }
}

/// One symbol's place in a Magic Formula ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub symbol: String,
    pub name: String,
    /// EBIT / enterprise value, as a fraction
    pub earnings_yield: f64,
    /// EBIT / invested capital, as a fraction
    pub roic: f64,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub ey_rank: usize,
    pub roic_rank: usize,
    pub combined_rank: usize,
}
