/// CAN SLIM screen
///
/// Seven independent pass/fail letters, each in its own section, followed by
/// a rating over the passes. The market-direction letter reads a broad index
/// fetched alongside the symbol; when that fetch fails the letter fails.

use tracing::warn;

use crate::error::AnalysisError;
use crate::indicators::{calculate_average_volume, calculate_rsi, calculate_sma};
use crate::market::Market;
use crate::models::{
    FinancialStatements, LineItem, PriceSeries, Row, ScoreCard, Section, Signal, SnapshotInfo,
    StatementTable,
};
use crate::provider::{DataProvider, PricePeriod};
use crate::Result;

use super::format::{self, NOT_AVAILABLE};

const MAX_ANNUAL_YEARS: usize = 5;
const SAME_QUARTER_LAST_YEAR: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Current,
    Annual,
    NewHighs,
    Supply,
    Leader,
    Institutional,
    Market,
    Rating,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Current => Stage::Annual,
            Stage::Annual => Stage::NewHighs,
            Stage::NewHighs => Stage::Supply,
            Stage::Supply => Stage::Leader,
            Stage::Leader => Stage::Institutional,
            Stage::Institutional => Stage::Market,
            Stage::Market => Stage::Rating,
            Stage::Rating | Stage::Done => Stage::Done,
        }
    }
}

/// Everything one CAN SLIM run reads
#[derive(Debug, Clone)]
pub struct CanSlimInputs {
    pub statements: FinancialStatements,
    pub info: SnapshotInfo,
    pub prices: PriceSeries,
    /// Broad market index; `None` when it could not be fetched
    pub index: Option<PriceSeries>,
}

/// Lazy CAN SLIM screen over prefetched inputs
#[derive(Debug, Clone)]
pub struct CanSlimAnalysis {
    inputs: CanSlimInputs,
    closes: Vec<f64>,
    market: Market,
    card: ScoreCard,
    stage: Stage,
}

/// Fetch statements, snapshot, a year of prices and the market index.
///
/// Symbol fetch failures propagate; an index failure is logged and leaves
/// the market-direction letter failing.
pub async fn canslim_analysis<P: DataProvider>(
    provider: &P,
    symbol: &str,
    market: Market,
) -> Result<CanSlimAnalysis> {
    let (statements, info, prices) = tokio::try_join!(
        provider.fetch_statements(symbol, market),
        provider.fetch_snapshot_info(symbol, market),
        provider.fetch_price_series(symbol, market, PricePeriod::OneYear),
    )?;

    let index = match provider
        .fetch_price_series(market.index_symbol(), market, PricePeriod::SixMonths)
        .await
    {
        Ok(series) => Some(series),
        Err(e) => {
            warn!("Market index {} unavailable: {}", market.index_symbol(), e);
            None
        }
    };

    CanSlimAnalysis::new(
        CanSlimInputs {
            statements,
            info,
            prices,
            index,
        },
        market,
    )
}

/// Compound annual growth over most-recent-first figures.
///
/// Exponent is 1 / number of figures read. `None` unless both ends are positive.
pub fn earnings_cagr(figures: &[f64]) -> Option<f64> {
    let newest = *figures.first()?;
    let oldest = *figures.last()?;
    if figures.len() < 2 || newest <= 0.0 || oldest <= 0.0 {
        return None;
    }
    Some((newest / oldest).powf(1.0 / figures.len() as f64) - 1.0)
}

/// Each year strictly above the one before, reading most-recent-first input
pub fn is_consistently_growing(figures: &[f64]) -> bool {
    figures.windows(2).all(|pair| pair[0] > pair[1])
}

fn pass_row(letter: char, passed: bool) -> Row {
    Row::pass_fail(format!("{} Score", letter), passed)
}

fn net_income_figures(table: &StatementTable, limit: usize) -> Vec<f64> {
    table
        .columns()
        .iter()
        .take(limit)
        .filter_map(|column| column.value(LineItem::NetIncome))
        .collect()
}

impl CanSlimAnalysis {
    pub fn new(inputs: CanSlimInputs, market: Market) -> Result<Self> {
        if inputs.prices.len() < 2 {
            return Err(AnalysisError::InsufficientData(format!(
                "{} has {} price points, need at least 2",
                inputs.prices.symbol(),
                inputs.prices.len()
            )));
        }

        Ok(Self {
            closes: inputs.prices.closes(),
            inputs,
            market,
            card: ScoreCard::new(),
            stage: Stage::Current,
        })
    }

    pub fn passes(&self) -> u32 {
        self.card.score()
    }

    fn latest(&self) -> f64 {
        self.closes[self.closes.len() - 1]
    }

    fn week52_high(&self) -> f64 {
        self.inputs
            .prices
            .candles()
            .iter()
            .map(|c| c.high)
            .fold(f64::MIN, f64::max)
    }

    fn finish(&mut self, name: &str, letter: char, passed: bool, mut rows: Vec<Row>) -> Section {
        self.card.check(passed);
        rows.push(pass_row(letter, passed));
        Section::new(name, rows)
    }

    fn current_earnings(&mut self) -> Section {
        let quarterly = &self.inputs.statements.quarterly.income;
        let mut passed = false;

        let row = if quarterly.len() < 2 {
            Row::plain("Quarterly EPS Growth", "Insufficient data")
        } else {
            let base_index = if quarterly.len() > SAME_QUARTER_LAST_YEAR {
                SAME_QUARTER_LAST_YEAR
            } else {
                1
            };

            match (
                quarterly.value(0, LineItem::NetIncome),
                quarterly.value(base_index, LineItem::NetIncome),
            ) {
                (Some(current), Some(base)) if base > 0.0 => {
                    let growth = (current - base) / base;
                    passed = growth > 0.25;
                    let signal = if passed {
                        Signal::Bullish
                    } else if growth > 0.0 {
                        Signal::Neutral
                    } else {
                        Signal::Bearish
                    };
                    Row::signalled("Quarterly EPS Growth", format!("{:.1}%", growth * 100.0), signal)
                }
                (Some(current), Some(_)) => {
                    passed = current > 0.0;
                    Row::signalled(
                        "Quarterly EPS",
                        if passed { "Turnaround" } else { "Negative" },
                        Signal::from_bool(passed),
                    )
                }
                _ => Row::plain("Quarterly EPS Growth", NOT_AVAILABLE),
            }
        };

        self.finish("C — Current Earnings", 'C', passed, vec![row])
    }

    fn annual_earnings(&mut self) -> Section {
        let figures = net_income_figures(&self.inputs.statements.annual.income, MAX_ANNUAL_YEARS);
        let mut passed = false;
        let mut rows = Vec::with_capacity(3);

        if figures.len() < 2 {
            rows.push(Row::plain("Annual Earnings", "Insufficient data"));
        } else {
            let growing = is_consistently_growing(&figures);
            let newest = figures[0];
            let oldest = figures[figures.len() - 1];

            if oldest > 0.0 {
                let cagr = earnings_cagr(&figures);
                passed = growing || cagr.is_some_and(|c| c > 0.15);
                rows.push(Row::signalled(
                    format!("Earnings CAGR ({}yr)", figures.len()),
                    cagr.map(|c| format!("{:.1}%", c * 100.0))
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    if passed { Signal::Bullish } else { Signal::Neutral },
                ));
            } else {
                passed = newest > 0.0;
                rows.push(Row::signalled(
                    "Annual Earnings Trend",
                    if passed { "Improving" } else { "Weak" },
                    Signal::from_bool(passed),
                ));
            }

            rows.push(Row::signalled(
                "Consistent Growth",
                if growing { "Yes" } else { "No" },
                if growing { Signal::Bullish } else { Signal::Neutral },
            ));
        }

        self.finish("A — Annual Earnings", 'A', passed, rows)
    }

    fn new_highs(&mut self) -> Section {
        let currency = self.market.currency();
        let high = self.week52_high();
        let latest = self.latest();
        let from_high = (latest - high) / high * 100.0;
        let passed = from_high >= -10.0;

        self.finish(
            "N — New Highs",
            'N',
            passed,
            vec![
                Row::plain("52-Week High", format::price(currency, high)),
                Row::plain("Current Price", format::price(currency, latest)),
                Row::signalled(
                    "Distance from High",
                    format!("{:.1}%", from_high),
                    Signal::from_bool(passed),
                ),
            ],
        )
    }

    fn supply_demand(&mut self) -> Section {
        let candles = self.inputs.prices.candles();
        let current_volume = candles[candles.len() - 1].volume;
        let avg_volume = calculate_average_volume(candles, 20);
        let ratio = match avg_volume {
            Some(avg) if avg > 0.0 => current_volume / avg,
            _ => 0.0,
        };
        let price_up = self.latest() > self.closes[self.closes.len() - 2];
        let passed = ratio > 1.0 && price_up;

        let mut rows = Vec::with_capacity(4);
        if let Some(shares) = self.inputs.info.shares_outstanding.filter(|s| *s != 0.0) {
            rows.push(Row::plain("Shares Outstanding", format::number(Some(shares))));
        }
        rows.push(Row::plain(
            "Avg Volume (20d)",
            avg_volume
                .map(format::count)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ));
        let ratio_signal = if ratio > 1.2 {
            Signal::Bullish
        } else if ratio < 0.8 {
            Signal::Bearish
        } else {
            Signal::Neutral
        };
        rows.push(Row::signalled("Volume Ratio", format!("{:.2}x", ratio), ratio_signal));

        self.finish("S — Supply & Demand", 'S', passed, rows)
    }

    fn leader(&mut self) -> Section {
        let latest = self.latest();
        let high = self.week52_high();
        let low = self.closes.iter().copied().fold(f64::MAX, f64::min);
        let position = if high != low {
            (latest - low) / (high - low) * 100.0
        } else {
            50.0
        };

        let rsi = calculate_rsi(&self.closes, 14);
        let strong_rsi = rsi.is_some_and(|r| r >= 50.0);
        let upper_range = position >= 60.0;

        let rsi_row = match rsi {
            Some(r) => Row::signalled("RSI (14)", format!("{:.1}", r), Signal::from_bool(strong_rsi)),
            None => Row::plain("RSI (14)", NOT_AVAILABLE),
        };

        self.finish(
            "L — Leader or Laggard",
            'L',
            strong_rsi && upper_range,
            vec![
                rsi_row,
                Row::signalled(
                    "52-Week Range Position",
                    format!("{:.1}%", position),
                    Signal::from_bool(upper_range),
                ),
            ],
        )
    }

    fn institutional(&mut self) -> Section {
        let held = self.inputs.info.held_percent_institutions;
        let passed = held.is_some_and(|h| h > 0.10);

        self.finish(
            "I — Institutional Sponsorship",
            'I',
            passed,
            vec![Row::signalled(
                "Institutional Ownership",
                held.map(|h| format!("{:.1}%", h * 100.0))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                if passed { Signal::Bullish } else { Signal::Neutral },
            )],
        )
    }

    fn market_direction(&mut self) -> Section {
        let name = self.market.index_name();
        let reading = self.inputs.index.as_ref().and_then(|index| {
            let closes = index.closes();
            let sma_50 = calculate_sma(&closes, 50)?;
            Some((*closes.last()?, sma_50))
        });

        let (passed, rows) = match reading {
            Some((latest, sma_50)) => {
                let uptrend = latest > sma_50;
                (
                    uptrend,
                    vec![
                        Row::plain(name, format::thousands(latest, 2)),
                        Row::plain(format!("{} SMA(50)", name), format::thousands(sma_50, 2)),
                        Row::signalled(
                            "Market Trend",
                            if uptrend { "Uptrend" } else { "Downtrend" },
                            Signal::from_bool(uptrend),
                        ),
                    ],
                )
            }
            None => (false, vec![Row::plain("Market Data", "Unavailable")]),
        };

        self.finish("M — Market Direction", 'M', passed, rows)
    }

    fn rating(&self) -> Section {
        let tier = self.card.tier_by_count(6, 4);
        Section::summary("CAN SLIM Rating", vec![self.card.rating_row("Rating", tier)])
    }
}

impl Iterator for CanSlimAnalysis {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        let section = match self.stage {
            Stage::Current => self.current_earnings(),
            Stage::Annual => self.annual_earnings(),
            Stage::NewHighs => self.new_highs(),
            Stage::Supply => self.supply_demand(),
            Stage::Leader => self.leader(),
            Stage::Institutional => self.institutional(),
            Stage::Market => self.market_direction(),
            Stage::Rating => self.rating(),
            Stage::Done => return None,
        };
        self.stage = self.stage.next();
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatementSet;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn quarter_ends(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024 - (i / 4) as i32, [12, 9, 6, 3][i % 4], 28).unwrap())
            .collect()
    }

    fn year_ends(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024 - i as i32, 3, 31).unwrap())
            .collect()
    }

    fn statements(quarterly_ni: &[f64], annual_ni: &[f64]) -> FinancialStatements {
        FinancialStatements {
            annual: StatementSet {
                income: StatementTable::with_periods(year_ends(annual_ni.len()))
                    .insert_row("Net Income", annual_ni),
                ..Default::default()
            },
            quarterly: StatementSet {
                income: StatementTable::with_periods(quarter_ends(quarterly_ni.len()))
                    .insert_row("Net Income", quarterly_ni),
                ..Default::default()
            },
        }
    }

    fn rising_prices() -> PriceSeries {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
        PriceSeries::from_closes("LEAD", start(), &closes)
    }

    fn inputs(index: Option<PriceSeries>) -> CanSlimInputs {
        CanSlimInputs {
            statements: statements(&[150.0, 120.0, 110.0, 105.0, 100.0], &[200.0, 150.0, 110.0]),
            info: SnapshotInfo {
                held_percent_institutions: Some(0.35),
                shares_outstanding: Some(5e8),
                ..Default::default()
            },
            prices: rising_prices(),
            index,
        }
    }

    fn run(inputs: CanSlimInputs) -> Vec<Section> {
        CanSlimAnalysis::new(inputs, Market::India).unwrap().collect()
    }

    #[test]
    fn test_section_order_and_rating() {
        let index = PriceSeries::from_closes("^NSEI", start(), &(0..60).map(|i| 20_000.0 + i as f64).collect::<Vec<_>>());
        let sections = run(inputs(Some(index)));

        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "C — Current Earnings",
                "A — Annual Earnings",
                "N — New Highs",
                "S — Supply & Demand",
                "L — Leader or Laggard",
                "I — Institutional Sponsorship",
                "M — Market Direction",
                "CAN SLIM Rating",
            ]
        );
        assert!(sections[7].is_summary);
        // constant volume keeps S at ratio 1.0, which does not pass
        assert_eq!(sections[3].row("S Score").unwrap().value, "FAIL");
        assert_eq!(sections[7].rows[0].value, "STRONG (6/7)");
    }

    #[test]
    fn test_current_quarter_compares_same_quarter_last_year() {
        let sections = run(inputs(None));
        let c = &sections[0];
        assert_eq!(c.row("Quarterly EPS Growth").unwrap().value, "50.0%");
        assert_eq!(c.row("C Score").unwrap().value, "PASS");
    }

    #[test]
    fn test_current_quarter_falls_back_to_prior_quarter() {
        let mut inputs = inputs(None);
        inputs.statements = statements(&[110.0, 100.0], &[200.0, 150.0]);
        let c = &run(inputs)[0];
        assert_eq!(c.row("Quarterly EPS Growth").unwrap().value, "10.0%");
        assert_eq!(c.row("Quarterly EPS Growth").unwrap().signal, Some(Signal::Neutral));
        assert_eq!(c.row("C Score").unwrap().value, "FAIL");
    }

    #[test]
    fn test_turnaround_quarter() {
        let mut inputs = inputs(None);
        inputs.statements = statements(&[10.0, -5.0], &[200.0, 150.0]);
        let c = &run(inputs)[0];
        assert_eq!(c.row("Quarterly EPS").unwrap().value, "Turnaround");
        assert_eq!(c.row("C Score").unwrap().value, "PASS");
    }

    #[test]
    fn test_annual_growth() {
        assert!(is_consistently_growing(&[200.0, 150.0, 110.0]));
        assert!(!is_consistently_growing(&[200.0, 210.0, 110.0]));

        let cagr = earnings_cagr(&[200.0, 150.0, 110.0]).unwrap();
        assert!((cagr - ((200.0_f64 / 110.0).powf(1.0 / 3.0) - 1.0)).abs() < 1e-12);
        assert_eq!(earnings_cagr(&[-10.0, 100.0]), None);

        let a = &run(inputs(None))[1];
        assert_eq!(a.rows[0].label, "Earnings CAGR (3yr)");
        assert_eq!(a.row("Consistent Growth").unwrap().value, "Yes");
        assert_eq!(a.row("A Score").unwrap().value, "PASS");
    }

    #[test]
    fn test_annual_loss_base_uses_latest_year() {
        let mut inputs = inputs(None);
        inputs.statements = statements(&[1.0, 1.0], &[50.0, -20.0]);
        let a = &run(inputs)[1];
        assert_eq!(a.row("Annual Earnings Trend").unwrap().value, "Improving");
        assert_eq!(a.row("A Score").unwrap().value, "PASS");
    }

    #[test]
    fn test_missing_index_fails_market_letter() {
        let sections = run(inputs(None));
        let m = &sections[6];
        assert_eq!(m.rows[0].label, "Market Data");
        assert_eq!(m.rows[0].value, "Unavailable");
        assert_eq!(m.row("M Score").unwrap().value, "FAIL");
        assert_eq!(sections[7].rows[0].value, "MODERATE (5/7)");
    }

    #[test]
    fn test_leader_and_new_highs() {
        let sections = run(inputs(None));
        assert_eq!(sections[2].row("Distance from High").unwrap().value, "0.0%");
        assert_eq!(sections[4].row("52-Week Range Position").unwrap().value, "100.0%");
        assert_eq!(sections[4].row("L Score").unwrap().value, "PASS");
        assert_eq!(sections[5].row("Institutional Ownership").unwrap().value, "35.0%");
    }
}
