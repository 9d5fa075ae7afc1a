/// Fundamental analysis over a snapshot of company fields
///
/// Every field is optional. A missing field renders "N/A" and carries no
/// signal; the overall rating counts it as a failed check.

use crate::market::Market;
use crate::models::{Row, ScoreCard, Section, Signal, SnapshotInfo};
use crate::provider::DataProvider;
use crate::Result;

use super::format::{self, NOT_AVAILABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    CompanyInfo,
    Valuation,
    EarningsGrowth,
    Profitability,
    CashFlow,
    FinancialHealth,
    Dividends,
    RiskRange,
    Overall,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::CompanyInfo => Stage::Valuation,
            Stage::Valuation => Stage::EarningsGrowth,
            Stage::EarningsGrowth => Stage::Profitability,
            Stage::Profitability => Stage::CashFlow,
            Stage::CashFlow => Stage::FinancialHealth,
            Stage::FinancialHealth => Stage::Dividends,
            Stage::Dividends => Stage::RiskRange,
            Stage::RiskRange => Stage::Overall,
            Stage::Overall | Stage::Done => Stage::Done,
        }
    }
}

/// Three-way threshold signal; `None` when the value is missing
fn banded(value: Option<f64>, bullish: impl Fn(f64) -> bool, bearish: impl Fn(f64) -> bool) -> Option<Signal> {
    value.map(|v| {
        if bullish(v) {
            Signal::Bullish
        } else if bearish(v) {
            Signal::Bearish
        } else {
            Signal::Neutral
        }
    })
}

/// Bullish when the condition holds, otherwise no signal
fn bullish_if(condition: bool) -> Option<Signal> {
    condition.then_some(Signal::Bullish)
}

fn both<T>(a: Option<T>, b: Option<T>) -> Option<(T, T)> {
    a.zip(b)
}

/// Ten independent checks behind the Overall Rating
pub fn score_fundamentals(info: &SnapshotInfo) -> ScoreCard {
    let above = |value: Option<f64>, threshold: f64| value.is_some_and(|v| v > threshold);

    let mut card = ScoreCard::new();
    card.check(info.trailing_pe.is_some_and(|pe| pe < 25.0));
    card.check(both(info.forward_pe, info.trailing_pe).is_some_and(|(fwd, ttm)| fwd < ttm));
    card.check(above(info.return_on_equity, 0.15));
    card.check(above(info.return_on_assets, 0.05));
    card.check(info.debt_to_equity.is_some_and(|de| de < 100.0));
    card.check(above(info.revenue_growth, 0.05));
    card.check(above(info.earnings_growth, 0.05));
    card.check(above(info.profit_margins, 0.10));
    card.check(above(info.operating_margins, 0.10));
    card.check(above(info.free_cashflow, 0.0));
    card
}

/// Lazy fundamental analysis over one snapshot
#[derive(Debug, Clone)]
pub struct FundamentalAnalysis {
    info: SnapshotInfo,
    currency: &'static str,
    stage: Stage,
}

/// Fetch the snapshot and prepare the section sequence
pub async fn fundamental_analysis<P: DataProvider>(
    provider: &P,
    symbol: &str,
    market: Market,
) -> Result<FundamentalAnalysis> {
    let info = provider.fetch_snapshot_info(symbol, market).await?;
    Ok(FundamentalAnalysis::new(info, market))
}

impl FundamentalAnalysis {
    pub fn new(info: SnapshotInfo, market: Market) -> Self {
        Self {
            info,
            currency: market.currency(),
            stage: Stage::CompanyInfo,
        }
    }

    fn money(&self, value: Option<f64>) -> String {
        format::amount(value, self.currency)
    }

    fn company_info(&self) -> Section {
        let text = |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Section::new(
            "Company Info",
            vec![
                Row::plain("Sector", text(&self.info.sector)),
                Row::plain("Industry", text(&self.info.industry)),
                Row::plain("Current Price", self.money(self.info.price())),
            ],
        )
    }

    fn valuation(&self) -> Section {
        let info = &self.info;
        let pe_signal = banded(info.trailing_pe, |pe| pe < 20.0, |pe| pe > 35.0);
        let forward_signal = bullish_if(
            both(info.forward_pe, info.trailing_pe).is_some_and(|(fwd, ttm)| fwd < ttm),
        );

        Section::new(
            "Valuation",
            vec![
                Row::plain("Market Cap", self.money(info.market_cap)),
                Row::plain("Enterprise Value", self.money(info.enterprise_value)),
                Row::new("PE Ratio (TTM)", format::number(info.trailing_pe), pe_signal),
                Row::new("PE Ratio (Forward)", format::number(info.forward_pe), forward_signal),
                Row::plain("PB Ratio", format::number(info.price_to_book)),
                Row::plain("P/S Ratio", format::number(info.price_to_sales_trailing_12_months)),
                Row::plain("EV/EBITDA", format::number(info.enterprise_to_ebitda)),
                Row::plain("EV/Revenue", format::number(info.enterprise_to_revenue)),
                Row::plain("Book Value", self.money(info.book_value)),
            ],
        )
    }

    fn earnings_growth(&self) -> Section {
        let info = &self.info;
        let growth = |value: Option<f64>| banded(value, |g| g > 0.05, |g| g < 0.0);
        let eps_signal = bullish_if(
            both(info.forward_eps, info.trailing_eps).is_some_and(|(fwd, ttm)| fwd > ttm),
        );

        Section::new(
            "Earnings & Growth",
            vec![
                Row::plain("EPS (TTM)", self.money(info.trailing_eps)),
                Row::new("EPS (Forward)", self.money(info.forward_eps), eps_signal),
                Row::plain("Revenue", self.money(info.total_revenue)),
                Row::plain("EBITDA", self.money(info.ebitda)),
                Row::new("Revenue Growth", format::percent(info.revenue_growth), growth(info.revenue_growth)),
                Row::new("Earnings Growth", format::percent(info.earnings_growth), growth(info.earnings_growth)),
            ],
        )
    }

    fn profitability(&self) -> Section {
        let info = &self.info;
        Section::new(
            "Profitability",
            vec![
                Row::plain("Gross Margin", format::percent(info.gross_margins)),
                Row::new(
                    "Operating Margin",
                    format::percent(info.operating_margins),
                    bullish_if(info.operating_margins.is_some_and(|m| m > 0.15)),
                ),
                Row::new(
                    "Profit Margin",
                    format::percent(info.profit_margins),
                    banded(info.profit_margins, |m| m > 0.10, |m| m < 0.05),
                ),
                Row::new(
                    "ROE",
                    format::percent(info.return_on_equity),
                    banded(info.return_on_equity, |r| r > 0.15, |r| r < 0.05),
                ),
                Row::new(
                    "ROA",
                    format::percent(info.return_on_assets),
                    bullish_if(info.return_on_assets.is_some_and(|r| r > 0.05)),
                ),
            ],
        )
    }

    fn cash_flow(&self) -> Section {
        let fcf = self.info.free_cashflow;
        let fcf_signal = match fcf {
            Some(v) if v > 0.0 => Some(Signal::Bullish),
            Some(v) if v < 0.0 => Some(Signal::Bearish),
            _ => None,
        };

        Section::new(
            "Cash Flow",
            vec![
                Row::plain("Operating Cash Flow", self.money(self.info.operating_cashflow)),
                Row::new("Free Cash Flow", self.money(fcf), fcf_signal),
            ],
        )
    }

    fn financial_health(&self) -> Section {
        let info = &self.info;
        Section::new(
            "Financial Health",
            vec![
                Row::new(
                    "Debt/Equity",
                    format::number(info.debt_to_equity),
                    banded(info.debt_to_equity, |de| de < 50.0, |de| de > 150.0),
                ),
                Row::plain("Total Debt", self.money(info.total_debt)),
                Row::plain("Total Cash", self.money(info.total_cash)),
                Row::new(
                    "Current Ratio",
                    format::number(info.current_ratio),
                    banded(info.current_ratio, |cr| cr > 1.5, |cr| cr < 1.0),
                ),
                Row::plain("Quick Ratio", format::number(info.quick_ratio)),
            ],
        )
    }

    /// Yield from rate and price when both are known, else the reported yield
    pub fn dividend_yield(info: &SnapshotInfo) -> String {
        match (info.dividend_rate, info.price()) {
            (Some(rate), Some(price)) if rate != 0.0 && price != 0.0 => {
                format!("{:.2}%", rate / price * 100.0)
            }
            _ => format::percent(info.dividend_yield),
        }
    }

    fn dividends(&self) -> Section {
        Section::new(
            "Dividends",
            vec![
                Row::plain("Dividend Yield", Self::dividend_yield(&self.info)),
                Row::plain("Dividend Rate", self.money(self.info.dividend_rate)),
                Row::plain("Payout Ratio", format::percent(self.info.payout_ratio)),
            ],
        )
    }

    fn risk_range(&self) -> Section {
        let info = &self.info;
        let position = match (info.fifty_two_week_high, info.fifty_two_week_low, info.price()) {
            (Some(high), Some(low), Some(price)) if high > low => {
                format!("{:.1}% from low", (price - low) / (high - low) * 100.0)
            }
            _ => NOT_AVAILABLE.to_string(),
        };

        Section::new(
            "Risk & Range",
            vec![
                Row::plain("Beta", format::number(info.beta)),
                Row::plain("52-Week High", self.money(info.fifty_two_week_high)),
                Row::plain("52-Week Low", self.money(info.fifty_two_week_low)),
                Row::plain("52-Week Position", position),
            ],
        )
    }

    fn overall(&self) -> Section {
        let card = score_fundamentals(&self.info);
        Section::summary(
            "Overall Rating",
            vec![card.rating_row("Rating", card.tier_by_percent())],
        )
    }
}

impl Iterator for FundamentalAnalysis {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        let section = match self.stage {
            Stage::CompanyInfo => self.company_info(),
            Stage::Valuation => self.valuation(),
            Stage::EarningsGrowth => self.earnings_growth(),
            Stage::Profitability => self.profitability(),
            Stage::CashFlow => self.cash_flow(),
            Stage::FinancialHealth => self.financial_health(),
            Stage::Dividends => self.dividends(),
            Stage::RiskRange => self.risk_range(),
            Stage::Overall => self.overall(),
            Stage::Done => return None,
        };
        self.stage = self.stage.next();
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;

    fn healthy() -> SnapshotInfo {
        SnapshotInfo {
            sector: Some("Technology".into()),
            industry: Some("IT Services".into()),
            regular_market_price: Some(3_500.0),
            market_cap: Some(1.3e13),
            trailing_pe: Some(18.0),
            forward_pe: Some(16.0),
            trailing_eps: Some(120.0),
            forward_eps: Some(135.0),
            revenue_growth: Some(0.08),
            earnings_growth: Some(0.12),
            operating_margins: Some(0.24),
            profit_margins: Some(0.19),
            return_on_equity: Some(0.45),
            return_on_assets: Some(0.2),
            free_cashflow: Some(4.0e11),
            debt_to_equity: Some(8.0),
            current_ratio: Some(2.4),
            dividend_rate: Some(70.0),
            fifty_two_week_high: Some(4_000.0),
            fifty_two_week_low: Some(3_000.0),
            ..Default::default()
        }
    }

    fn sections(info: SnapshotInfo) -> Vec<Section> {
        FundamentalAnalysis::new(info, Market::India).collect()
    }

    #[test]
    fn test_section_order() {
        let names: Vec<String> = sections(healthy()).into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "Company Info",
                "Valuation",
                "Earnings & Growth",
                "Profitability",
                "Cash Flow",
                "Financial Health",
                "Dividends",
                "Risk & Range",
                "Overall Rating",
            ]
        );
    }

    #[test]
    fn test_healthy_company_rates_strong() {
        let card = score_fundamentals(&healthy());
        assert_eq!(card.score(), 10);
        assert_eq!(card.tier_by_percent(), Tier::Strong);

        let summary = sections(healthy()).pop().unwrap();
        assert!(summary.is_summary);
        assert_eq!(summary.rows[0].value, "STRONG (10/10)");
    }

    #[test]
    fn test_missing_fields_render_na_without_signal() {
        let info = SnapshotInfo {
            regular_market_price: Some(10.0),
            ..Default::default()
        };
        let all = sections(info);

        let valuation = &all[1];
        let pe = valuation.row("PE Ratio (TTM)").unwrap();
        assert_eq!(pe.value, NOT_AVAILABLE);
        assert_eq!(pe.signal, None);

        let growth = all[2].row("Revenue Growth").unwrap();
        assert_eq!(growth.value, NOT_AVAILABLE);
        assert_eq!(growth.signal, None);

        assert_eq!(all[0].row("Sector").unwrap().value, NOT_AVAILABLE);
        assert_eq!(all[8].rows[0].value, "WEAK (0/10)");
    }

    #[test]
    fn test_thresholds() {
        let info = SnapshotInfo {
            trailing_pe: Some(40.0),
            return_on_equity: Some(0.10),
            debt_to_equity: Some(200.0),
            current_ratio: Some(0.8),
            revenue_growth: Some(-0.02),
            earnings_growth: Some(0.03),
            ..Default::default()
        };
        let all = sections(info);

        assert_eq!(all[1].row("PE Ratio (TTM)").unwrap().signal, Some(Signal::Bearish));
        assert_eq!(all[2].row("Revenue Growth").unwrap().signal, Some(Signal::Bearish));
        assert_eq!(all[2].row("Earnings Growth").unwrap().signal, Some(Signal::Neutral));
        assert_eq!(all[3].row("ROE").unwrap().signal, Some(Signal::Neutral));
        assert_eq!(all[5].row("Debt/Equity").unwrap().signal, Some(Signal::Bearish));
        assert_eq!(all[5].row("Current Ratio").unwrap().signal, Some(Signal::Bearish));
    }

    #[test]
    fn test_amounts_use_crore_and_currency() {
        let all = sections(healthy());
        assert_eq!(all[1].row("Market Cap").unwrap().value, "₹1,300,000.00 Cr");
        assert_eq!(all[0].row("Current Price").unwrap().value, "₹3,500.00");
        assert_eq!(all[3].row("Profit Margin").unwrap().value, "19.00%");
    }

    #[test]
    fn test_dividend_yield_and_range_position() {
        let all = sections(healthy());
        assert_eq!(all[6].row("Dividend Yield").unwrap().value, "2.00%");
        assert_eq!(all[7].row("52-Week Position").unwrap().value, "50.0% from low");

        let info = SnapshotInfo {
            dividend_yield: Some(0.0125),
            ..Default::default()
        };
        assert_eq!(FundamentalAnalysis::dividend_yield(&info), "1.25%");
        assert_eq!(
            FundamentalAnalysis::dividend_yield(&SnapshotInfo::default()),
            NOT_AVAILABLE
        );
    }
}
