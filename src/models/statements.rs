use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which statement a line item is reported on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Income,
    BalanceSheet,
    CashFlow,
}

/// Canonical statement line items.
///
/// Providers label the same figure differently; each item carries its
/// candidate labels in lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineItem {
    NetIncome,
    TotalRevenue,
    CostOfRevenue,
    GrossProfit,
    Ebit,
    OperatingExpense,
    TotalAssets,
    LongTermDebt,
    CurrentAssets,
    CurrentLiabilities,
    SharesOutstanding,
    OperatingCashFlow,
}

impl LineItem {
    pub const ALL: [LineItem; 12] = [
        LineItem::NetIncome,
        LineItem::TotalRevenue,
        LineItem::CostOfRevenue,
        LineItem::GrossProfit,
        LineItem::Ebit,
        LineItem::OperatingExpense,
        LineItem::TotalAssets,
        LineItem::LongTermDebt,
        LineItem::CurrentAssets,
        LineItem::CurrentLiabilities,
        LineItem::SharesOutstanding,
        LineItem::OperatingCashFlow,
    ];

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            LineItem::NetIncome => &[
                "Net Income",
                "Net Income Common Stockholders",
                "Net Income From Continuing Operations",
            ],
            LineItem::TotalRevenue => &["Total Revenue", "Operating Revenue"],
            LineItem::CostOfRevenue => &["Cost Of Revenue", "Cost Of Goods Sold"],
            LineItem::GrossProfit => &["Gross Profit"],
            LineItem::Ebit => &["EBIT", "Operating Income"],
            LineItem::OperatingExpense => &[
                "Operating Expense",
                "Total Operating Expenses",
                "Selling General And Administration",
            ],
            LineItem::TotalAssets => &["Total Assets"],
            LineItem::LongTermDebt => &[
                "Long Term Debt",
                "Long Term Debt And Capital Lease Obligation",
            ],
            LineItem::CurrentAssets => &["Current Assets", "Total Current Assets"],
            LineItem::CurrentLiabilities => &["Current Liabilities", "Total Current Liabilities"],
            LineItem::SharesOutstanding => &["Ordinary Shares Number", "Share Issued"],
            LineItem::OperatingCashFlow => &[
                "Operating Cash Flow",
                "Total Cash From Operating Activities",
                "Cash Flow From Continuing Operating Activities",
            ],
        }
    }

    pub fn statement(&self) -> StatementKind {
        match self {
            LineItem::NetIncome
            | LineItem::TotalRevenue
            | LineItem::CostOfRevenue
            | LineItem::GrossProfit
            | LineItem::Ebit
            | LineItem::OperatingExpense => StatementKind::Income,
            LineItem::TotalAssets
            | LineItem::LongTermDebt
            | LineItem::CurrentAssets
            | LineItem::CurrentLiabilities
            | LineItem::SharesOutstanding => StatementKind::BalanceSheet,
            LineItem::OperatingCashFlow => StatementKind::CashFlow,
        }
    }
}

/// One reporting period: line-item label to value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementColumn {
    pub period_end: NaiveDate,
    pub values: HashMap<String, f64>,
}

impl StatementColumn {
    /// First finite value among the item's aliases
    pub fn value(&self, item: LineItem) -> Option<f64> {
        item.aliases().iter().find_map(|label| self.raw(label))
    }

    pub fn raw(&self, label: &str) -> Option<f64> {
        self.values.get(label).copied().filter(|v| v.is_finite())
    }
}

/// Annual or quarterly statement, most recent period first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    columns: Vec<StatementColumn>,
}

impl StatementTable {
    pub fn new(mut columns: Vec<StatementColumn>) -> Self {
        columns.sort_by(|a, b| b.period_end.cmp(&a.period_end));
        Self { columns }
    }

    /// Empty columns for the given period ends, to be filled with `insert_row`
    pub fn with_periods(period_ends: Vec<NaiveDate>) -> Self {
        Self::new(
            period_ends
                .into_iter()
                .map(|period_end| StatementColumn {
                    period_end,
                    values: HashMap::new(),
                })
                .collect(),
        )
    }

    /// Set `label` across columns, most recent first. NaN leaves a gap.
    pub fn insert_row(mut self, label: &str, values: &[f64]) -> Self {
        for (column, &value) in self.columns.iter_mut().zip(values) {
            if value.is_finite() {
                column.values.insert(label.to_string(), value);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[StatementColumn] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&StatementColumn> {
        self.columns.get(index)
    }

    /// Aliased lookup in column `index` (0 = most recent)
    pub fn value(&self, index: usize, item: LineItem) -> Option<f64> {
        self.column(index)?.value(item)
    }
}

/// Income statement, balance sheet and cash flow for one frequency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementSet {
    pub income: StatementTable,
    pub balance_sheet: StatementTable,
    pub cash_flow: StatementTable,
}

impl StatementSet {
    pub fn table(&self, kind: StatementKind) -> &StatementTable {
        match kind {
            StatementKind::Income => &self.income,
            StatementKind::BalanceSheet => &self.balance_sheet,
            StatementKind::CashFlow => &self.cash_flow,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub annual: StatementSet,
    pub quarterly: StatementSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn year_end(year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, 3, 31).unwrap()
    }

    #[test]
    fn test_columns_sorted_most_recent_first() {
        let table = StatementTable::with_periods(vec![year_end(2022), year_end(2024), year_end(2023)]);
        let ends: Vec<_> = table.columns().iter().map(|c| c.period_end).collect();
        assert_eq!(ends, vec![year_end(2024), year_end(2023), year_end(2022)]);
    }

    #[test]
    fn test_alias_priority() {
        let table = StatementTable::with_periods(vec![year_end(2024)])
            .insert_row("Net Income Common Stockholders", &[90.0])
            .insert_row("Net Income From Continuing Operations", &[80.0]);
        assert_eq!(table.value(0, LineItem::NetIncome), Some(90.0));

        let table = table.insert_row("Net Income", &[100.0]);
        assert_eq!(table.value(0, LineItem::NetIncome), Some(100.0));
    }

    #[test]
    fn test_nan_leaves_gap_and_falls_through() {
        let table = StatementTable::with_periods(vec![year_end(2024), year_end(2023)])
            .insert_row("Ordinary Shares Number", &[f64::NAN, 1_000.0])
            .insert_row("Share Issued", &[1_050.0, 1_010.0]);
        assert_eq!(table.value(0, LineItem::SharesOutstanding), Some(1_050.0));
        assert_eq!(table.value(1, LineItem::SharesOutstanding), Some(1_000.0));
    }

    #[test]
    fn test_missing_column_and_item() {
        let table = StatementTable::with_periods(vec![year_end(2024)]).insert_row("Total Assets", &[5.0]);
        assert_eq!(table.value(1, LineItem::TotalAssets), None);
        assert_eq!(table.value(0, LineItem::LongTermDebt), None);
        assert_eq!(table.len(), 1);
        assert!(StatementTable::default().is_empty());
    }

    #[test]
    fn test_line_item_statement_kind() {
        assert_eq!(LineItem::NetIncome.statement(), StatementKind::Income);
        assert_eq!(LineItem::SharesOutstanding.statement(), StatementKind::BalanceSheet);
        assert_eq!(LineItem::OperatingCashFlow.statement(), StatementKind::CashFlow);
    }
}
