/// Piotroski F-Score from annual statements
///
/// Nine binary checks in three groups. Year-over-year checks read column 0
/// (latest year) against column 1 (prior year) and fall back to an absolute
/// test when no prior year is available.

use crate::market::Market;
use crate::models::{
    FinancialStatements, LineItem, Row, ScoreCard, Section, Signal, SnapshotInfo, StatementSet,
};
use crate::provider::DataProvider;
use crate::Result;

use super::format::{self, NOT_AVAILABLE};

const CURRENT: usize = 0;
const PRIOR: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Profitability,
    Leverage,
    Efficiency,
    Summary,
    Insufficient,
    Done,
}

/// Outcome of one check and the text shown for it
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub value: String,
}

impl CheckOutcome {
    fn new(passed: bool, value: impl Into<String>) -> Self {
        Self {
            passed,
            value: value.into(),
        }
    }

    fn row(&self, label: &str) -> Row {
        Row::signalled(label, self.value.clone(), Signal::from_bool(self.passed))
    }
}

fn pct(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// `numerator / denominator` when the denominator is present and non-zero
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Lazy F-Score over one company's annual statements
#[derive(Debug, Clone)]
pub struct PiotroskiAnalysis {
    annual: StatementSet,
    shares_outstanding: Option<f64>,
    currency: &'static str,
    has_prior: bool,
    card: ScoreCard,
    stage: Stage,
}

/// Fetch statements and snapshot concurrently and prepare the sequence
pub async fn piotroski_analysis<P: DataProvider>(
    provider: &P,
    symbol: &str,
    market: Market,
) -> Result<PiotroskiAnalysis> {
    let (statements, info) = tokio::try_join!(
        provider.fetch_statements(symbol, market),
        provider.fetch_snapshot_info(symbol, market),
    )?;
    Ok(PiotroskiAnalysis::new(&statements, &info, market))
}

impl PiotroskiAnalysis {
    pub fn new(statements: &FinancialStatements, info: &SnapshotInfo, market: Market) -> Self {
        let annual = statements.annual.clone();
        let insufficient =
            annual.income.is_empty() || annual.balance_sheet.is_empty() || annual.cash_flow.is_empty();
        let has_prior = annual.income.len() >= 2 && annual.balance_sheet.len() >= 2;

        Self {
            annual,
            shares_outstanding: info.shares_outstanding,
            currency: market.currency(),
            has_prior,
            card: ScoreCard::new(),
            stage: if insufficient {
                Stage::Insufficient
            } else {
                Stage::Profitability
            },
        }
    }

    pub fn score(&self) -> u32 {
        self.card.score()
    }

    fn income(&self, index: usize, item: LineItem) -> Option<f64> {
        if index == PRIOR && !self.has_prior {
            return None;
        }
        self.annual.income.value(index, item)
    }

    fn balance(&self, index: usize, item: LineItem) -> Option<f64> {
        if index == PRIOR && !self.has_prior {
            return None;
        }
        self.annual.balance_sheet.value(index, item)
    }

    fn cash_flow(&self, item: LineItem) -> Option<f64> {
        self.annual.cash_flow.value(CURRENT, item)
    }

    fn record(&mut self, outcome: &CheckOutcome) {
        self.card.check(outcome.passed);
    }

    fn profitability(&mut self) -> Section {
        let net_income = self.income(CURRENT, LineItem::NetIncome);
        let total_assets = self.balance(CURRENT, LineItem::TotalAssets);
        let ocf = self.cash_flow(LineItem::OperatingCashFlow);
        let roa = ratio(net_income, total_assets);

        let money = |v: Option<f64>| format::amount(v, self.currency);
        let checks = [
            (
                "Net Income > 0",
                CheckOutcome::new(net_income.is_some_and(|ni| ni > 0.0), money(net_income)),
            ),
            (
                "ROA > 0",
                CheckOutcome::new(
                    roa.is_some_and(|r| r > 0.0),
                    roa.map(pct).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                ),
            ),
            (
                "Operating CF > 0",
                CheckOutcome::new(ocf.is_some_and(|cf| cf > 0.0), money(ocf)),
            ),
            ("CF > Net Income (Quality)", {
                let quality = matches!((ocf, net_income), (Some(cf), Some(ni)) if cf > ni);
                CheckOutcome::new(quality, if quality { "Yes" } else { "No" })
            }),
        ];

        let rows = checks
            .iter()
            .map(|(label, outcome)| {
                self.record(outcome);
                outcome.row(label)
            })
            .collect();
        Section::new("Profitability (4 pts)", rows)
    }

    /// Long-term debt to assets must not rise. No current debt, or no prior
    /// figure to compare against, passes.
    pub fn debt_ratio_check(&self) -> CheckOutcome {
        let curr_debt = self.balance(CURRENT, LineItem::LongTermDebt);
        let prev_debt = self.balance(PRIOR, LineItem::LongTermDebt);
        let curr_ratio = ratio(curr_debt, self.balance(CURRENT, LineItem::TotalAssets));
        let prev_ratio = ratio(prev_debt, self.balance(PRIOR, LineItem::TotalAssets));

        if curr_debt == Some(0.0) {
            return CheckOutcome::new(true, "No long-term debt");
        }

        match (curr_ratio, prev_ratio) {
            (Some(curr), Some(prev)) => {
                CheckOutcome::new(curr <= prev, format!("{} vs {}", pct(curr), pct(prev)))
            }
            _ if curr_debt.is_some() && prev_debt.is_none() => {
                CheckOutcome::new(true, "No long-term debt")
            }
            _ => CheckOutcome::new(false, NOT_AVAILABLE),
        }
    }

    pub fn current_ratio_check(&self) -> CheckOutcome {
        let current_ratio = |index| {
            ratio(
                self.balance(index, LineItem::CurrentAssets),
                self.balance(index, LineItem::CurrentLiabilities),
            )
        };

        match (current_ratio(CURRENT), current_ratio(PRIOR)) {
            (Some(curr), Some(prev)) => {
                CheckOutcome::new(curr > prev, format!("{:.2} vs {:.2}", curr, prev))
            }
            (Some(curr), None) => CheckOutcome::new(curr > 1.0, format!("{:.2}", curr)),
            _ => CheckOutcome::new(false, NOT_AVAILABLE),
        }
    }

    /// Share count must not grow; without a prior count the check passes
    pub fn dilution_check(&self) -> CheckOutcome {
        let curr = self.balance(CURRENT, LineItem::SharesOutstanding);
        let prev = self.balance(PRIOR, LineItem::SharesOutstanding);

        match (curr, prev) {
            (Some(curr), Some(prev)) => CheckOutcome::new(
                curr <= prev,
                format!("{} vs {}", format::count(curr), format::count(prev)),
            ),
            _ => match self.shares_outstanding {
                Some(shares) => {
                    CheckOutcome::new(true, format!("{} (prior N/A)", format::count(shares)))
                }
                None => CheckOutcome::new(true, NOT_AVAILABLE),
            },
        }
    }

    fn leverage(&mut self) -> Section {
        let checks = [
            ("Lower Debt Ratio YoY", self.debt_ratio_check()),
            ("Higher Current Ratio YoY", self.current_ratio_check()),
            ("No New Shares Issued", self.dilution_check()),
        ];

        let rows = checks
            .iter()
            .map(|(label, outcome)| {
                self.record(outcome);
                outcome.row(label)
            })
            .collect();
        Section::new("Leverage & Liquidity (3 pts)", rows)
    }

    fn gross_margin(&self, index: usize) -> Option<f64> {
        let revenue = self.income(index, LineItem::TotalRevenue);
        let gross = self.income(index, LineItem::GrossProfit).or_else(|| {
            let cost = self.income(index, LineItem::CostOfRevenue)?;
            Some(revenue? - cost)
        });
        ratio(gross, revenue)
    }

    pub fn gross_margin_check(&self) -> CheckOutcome {
        match (self.gross_margin(CURRENT), self.gross_margin(PRIOR)) {
            (Some(curr), Some(prev)) => {
                CheckOutcome::new(curr > prev, format!("{} vs {}", pct(curr), pct(prev)))
            }
            (Some(curr), None) => CheckOutcome::new(curr > 0.2, pct(curr)),
            _ => CheckOutcome::new(false, NOT_AVAILABLE),
        }
    }

    pub fn asset_turnover_check(&self) -> CheckOutcome {
        let turnover = |index| {
            ratio(
                self.income(index, LineItem::TotalRevenue),
                self.balance(index, LineItem::TotalAssets),
            )
        };

        match (turnover(CURRENT), turnover(PRIOR)) {
            (Some(curr), Some(prev)) => {
                CheckOutcome::new(curr > prev, format!("{:.2} vs {:.2}", curr, prev))
            }
            (Some(curr), None) => CheckOutcome::new(true, format!("{:.2}", curr)),
            _ => CheckOutcome::new(false, NOT_AVAILABLE),
        }
    }

    fn efficiency(&mut self) -> Section {
        let checks = [
            ("Higher Gross Margin YoY", self.gross_margin_check()),
            ("Higher Asset Turnover YoY", self.asset_turnover_check()),
        ];

        let rows = checks
            .iter()
            .map(|(label, outcome)| {
                self.record(outcome);
                outcome.row(label)
            })
            .collect();
        Section::new("Operating Efficiency (2 pts)", rows)
    }

    fn summary(&self) -> Section {
        let tier = self.card.tier_by_count(7, 4);
        Section::summary(
            "Piotroski F-Score",
            vec![Row::signalled(
                "F-Score",
                format!("{} ({}/9)", tier.label(), self.card.score()),
                tier.signal(),
            )],
        )
    }
}

impl Iterator for PiotroskiAnalysis {
    type Item = Section;

    fn next(&mut self) -> Option<Section> {
        let (section, next) = match self.stage {
            Stage::Profitability => (self.profitability(), Stage::Leverage),
            Stage::Leverage => (self.leverage(), Stage::Efficiency),
            Stage::Efficiency => (self.efficiency(), Stage::Summary),
            Stage::Summary => (self.summary(), Stage::Done),
            Stage::Insufficient => (
                Section::summary(
                    "Piotroski F-Score",
                    vec![Row::signalled(
                        "Error",
                        "Insufficient financial data available",
                        Signal::Bearish,
                    )],
                ),
                Stage::Done,
            ),
            Stage::Done => return None,
        };
        self.stage = next;
        Some(section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StatementSet, StatementTable, Tier};
    use chrono::NaiveDate;

    fn years() -> Vec<NaiveDate> {
        vec![
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 31).unwrap(),
        ]
    }

    /// Every year-over-year measure improves
    fn improving() -> FinancialStatements {
        let income = StatementTable::with_periods(years())
            .insert_row("Net Income", &[120.0, 100.0])
            .insert_row("Total Revenue", &[1_000.0, 900.0])
            .insert_row("Gross Profit", &[450.0, 380.0]);
        let balance = StatementTable::with_periods(years())
            .insert_row("Total Assets", &[2_000.0, 2_000.0])
            .insert_row("Long Term Debt", &[300.0, 400.0])
            .insert_row("Current Assets", &[800.0, 700.0])
            .insert_row("Current Liabilities", &[400.0, 400.0])
            .insert_row("Ordinary Shares Number", &[50.0, 50.0]);
        let cash_flow = StatementTable::with_periods(years()).insert_row("Operating Cash Flow", &[150.0, 110.0]);

        FinancialStatements {
            annual: StatementSet {
                income,
                balance_sheet: balance,
                cash_flow,
            },
            quarterly: StatementSet::default(),
        }
    }

    fn analysis(statements: &FinancialStatements) -> PiotroskiAnalysis {
        PiotroskiAnalysis::new(statements, &SnapshotInfo::default(), Market::India)
    }

    #[test]
    fn test_improving_company_scores_nine() {
        let sections: Vec<Section> = analysis(&improving()).collect();

        assert_eq!(sections.len(), 4);
        assert!(sections.iter().flat_map(|s| &s.rows).all(|r| r.signal == Some(Signal::Bullish)));

        let summary = &sections[3];
        assert!(summary.is_summary);
        assert_eq!(summary.rows[0].value, "STRONG (9/9)");
        assert_eq!(summary.rows[0].signal, Some(Tier::Strong.signal()));
    }

    #[test]
    fn test_empty_statement_yields_single_error_section() {
        let mut statements = improving();
        statements.annual.cash_flow = StatementTable::default();

        let sections: Vec<Section> = analysis(&statements).collect();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].is_summary);
        assert_eq!(sections[0].name, "Piotroski F-Score");
        let row = &sections[0].rows[0];
        assert_eq!(row.label, "Error");
        assert_eq!(row.value, "Insufficient financial data available");
        assert_eq!(row.signal, Some(Signal::Bearish));
    }

    #[test]
    fn test_rows_render_values() {
        let sections: Vec<Section> = analysis(&improving()).collect();

        assert_eq!(sections[0].row("ROA > 0").unwrap().value, "6.00%");
        assert_eq!(sections[0].row("CF > Net Income (Quality)").unwrap().value, "Yes");
        assert_eq!(sections[1].row("Lower Debt Ratio YoY").unwrap().value, "15.00% vs 20.00%");
        assert_eq!(sections[1].row("Higher Current Ratio YoY").unwrap().value, "2.00 vs 1.75");
        assert_eq!(sections[1].row("No New Shares Issued").unwrap().value, "50 vs 50");
        assert_eq!(sections[2].row("Higher Gross Margin YoY").unwrap().value, "45.00% vs 42.22%");
    }

    #[test]
    fn test_single_year_fallbacks() {
        let year = vec![years()[0]];
        let statements = FinancialStatements {
            annual: StatementSet {
                income: StatementTable::with_periods(year.clone())
                    .insert_row("Net Income", &[50.0])
                    .insert_row("Total Revenue", &[1_000.0])
                    .insert_row("Cost Of Revenue", &[850.0]),
                balance_sheet: StatementTable::with_periods(year.clone())
                    .insert_row("Total Assets", &[2_000.0])
                    .insert_row("Long Term Debt", &[500.0])
                    .insert_row("Current Assets", &[300.0])
                    .insert_row("Current Liabilities", &[400.0]),
                cash_flow: StatementTable::with_periods(year).insert_row("Operating Cash Flow", &[40.0]),
            },
            quarterly: StatementSet::default(),
        };
        let info = SnapshotInfo {
            shares_outstanding: Some(1_000_000.0),
            ..Default::default()
        };
        let analysis = PiotroskiAnalysis::new(&statements, &info, Market::India);

        assert_eq!(analysis.debt_ratio_check(), CheckOutcome::new(true, "No long-term debt"));
        assert_eq!(analysis.current_ratio_check(), CheckOutcome::new(false, "0.75"));
        assert_eq!(analysis.dilution_check(), CheckOutcome::new(true, "1,000,000 (prior N/A)"));
        // gross margin falls back to revenue - cost: 15% is below the 20% bar
        assert_eq!(analysis.gross_margin_check(), CheckOutcome::new(false, "15.00%"));
        assert_eq!(analysis.asset_turnover_check(), CheckOutcome::new(true, "0.50"));

        let summary = analysis.last().unwrap();
        // NI, ROA, OCF, debt, shares, turnover
        assert_eq!(summary.rows[0].value, "MODERATE (6/9)");
    }

    #[test]
    fn test_missing_debt_fails() {
        let mut statements = improving();
        statements.annual.balance_sheet = StatementTable::with_periods(years())
            .insert_row("Total Assets", &[2_000.0, 2_000.0]);
        assert_eq!(analysis(&statements).debt_ratio_check(), CheckOutcome::new(false, NOT_AVAILABLE));
    }

    #[test]
    fn test_zero_current_debt_passes() {
        let mut statements = improving();
        statements.annual.balance_sheet = statements
            .annual
            .balance_sheet
            .clone()
            .insert_row("Long Term Debt", &[0.0, 400.0]);
        let outcome = analysis(&statements).debt_ratio_check();
        assert!(outcome.passed);
        assert_eq!(outcome.value, "No long-term debt");

        // prior total assets unknown, so no ratio to compare against
        statements.annual.balance_sheet = StatementTable::with_periods(years())
            .insert_row("Total Assets", &[2_000.0, f64::NAN])
            .insert_row("Long Term Debt", &[0.0, 400.0]);
        assert!(analysis(&statements).debt_ratio_check().passed);
    }

    #[test]
    fn test_rising_debt_ratio_fails() {
        let mut statements = improving();
        statements.annual.balance_sheet = statements
            .annual
            .balance_sheet
            .clone()
            .insert_row("Long Term Debt", &[500.0, 400.0]);
        assert_eq!(
            analysis(&statements).debt_ratio_check(),
            CheckOutcome::new(false, "25.00% vs 20.00%")
        );
    }

    #[test]
    fn test_dilution_fails_when_shares_grow() {
        let mut statements = improving();
        statements.annual.balance_sheet = statements
            .annual
            .balance_sheet
            .clone()
            .insert_row("Ordinary Shares Number", &[55.0, 50.0]);
        assert!(!analysis(&statements).dilution_check().passed);
    }
}
