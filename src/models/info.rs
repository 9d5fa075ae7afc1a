use serde::{Deserialize, Serialize};

/// Snapshot of descriptive and fundamental fields for one symbol.
///
/// Every field is optional; field names follow the upstream quote-summary
/// naming so a flattened provider payload deserializes directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotInfo {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,

    pub regular_market_price: Option<f64>,
    pub current_price: Option<f64>,

    // Valuation
    pub market_cap: Option<f64>,
    pub enterprise_value: Option<f64>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub price_to_sales_trailing_12_months: Option<f64>,
    pub enterprise_to_ebitda: Option<f64>,
    pub enterprise_to_revenue: Option<f64>,
    pub book_value: Option<f64>,

    // Earnings & growth
    pub trailing_eps: Option<f64>,
    pub forward_eps: Option<f64>,
    pub total_revenue: Option<f64>,
    pub ebitda: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub earnings_growth: Option<f64>,

    // Profitability
    pub gross_margins: Option<f64>,
    pub operating_margins: Option<f64>,
    pub profit_margins: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,

    // Cash flow
    pub operating_cashflow: Option<f64>,
    pub free_cashflow: Option<f64>,

    // Financial health
    pub debt_to_equity: Option<f64>,
    pub total_debt: Option<f64>,
    pub total_cash: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,

    // Dividends
    pub dividend_yield: Option<f64>,
    pub dividend_rate: Option<f64>,
    pub payout_ratio: Option<f64>,

    // Risk & range
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,

    // Ownership
    pub shares_outstanding: Option<f64>,
    pub held_percent_institutions: Option<f64>,
}

impl SnapshotInfo {
    /// Latest market price, preferring the regular-session quote
    pub fn price(&self) -> Option<f64> {
        self.regular_market_price.or(self.current_price)
    }

    /// Display name, falling back to the given symbol
    pub fn display_name(&self, symbol: &str) -> String {
        self.short_name
            .clone()
            .or_else(|| self.long_name.clone())
            .unwrap_or_else(|| symbol.to_string())
    }

    /// Drop NaN/infinite numbers so downstream comparisons only see real values
    pub fn sanitized(mut self) -> Self {
        let fields = [
            &mut self.regular_market_price,
            &mut self.current_price,
            &mut self.market_cap,
            &mut self.enterprise_value,
            &mut self.trailing_pe,
            &mut self.forward_pe,
            &mut self.price_to_book,
            &mut self.price_to_sales_trailing_12_months,
            &mut self.enterprise_to_ebitda,
            &mut self.enterprise_to_revenue,
            &mut self.book_value,
            &mut self.trailing_eps,
            &mut self.forward_eps,
            &mut self.total_revenue,
            &mut self.ebitda,
            &mut self.revenue_growth,
            &mut self.earnings_growth,
            &mut self.gross_margins,
            &mut self.operating_margins,
            &mut self.profit_margins,
            &mut self.return_on_equity,
            &mut self.return_on_assets,
            &mut self.operating_cashflow,
            &mut self.free_cashflow,
            &mut self.debt_to_equity,
            &mut self.total_debt,
            &mut self.total_cash,
            &mut self.current_ratio,
            &mut self.quick_ratio,
            &mut self.dividend_yield,
            &mut self.dividend_rate,
            &mut self.payout_ratio,
            &mut self.beta,
            &mut self.fifty_two_week_high,
            &mut self.fifty_two_week_low,
            &mut self.shares_outstanding,
            &mut self.held_percent_institutions,
        ];
        for field in fields {
            if field.is_some_and(|v| !v.is_finite()) {
                *field = None;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_upstream_names() {
        let json = serde_json::json!({
            "regularMarketPrice": 2450.5,
            "trailingPE": 22.1,
            "forwardPE": 19.4,
            "priceToSalesTrailing12Months": 2.3,
            "fiftyTwoWeekHigh": 2600.0,
            "heldPercentInstitutions": 0.21,
            "sector": "Energy",
            "unknownField": 1
        });
        let info: SnapshotInfo = serde_json::from_value(json).unwrap();
        assert_eq!(info.price(), Some(2450.5));
        assert_eq!(info.trailing_pe, Some(22.1));
        assert_eq!(info.forward_pe, Some(19.4));
        assert_eq!(info.price_to_sales_trailing_12_months, Some(2.3));
        assert_eq!(info.fifty_two_week_high, Some(2600.0));
        assert_eq!(info.held_percent_institutions, Some(0.21));
        assert_eq!(info.sector.as_deref(), Some("Energy"));
        assert_eq!(info.book_value, None);
    }

    #[test]
    fn test_price_falls_back_to_current_price() {
        let info = SnapshotInfo {
            current_price: Some(10.0),
            ..Default::default()
        };
        assert_eq!(info.price(), Some(10.0));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut info = SnapshotInfo::default();
        assert_eq!(info.display_name("TCS"), "TCS");
        info.long_name = Some("Tata Consultancy Services Limited".to_string());
        assert_eq!(info.display_name("TCS"), "Tata Consultancy Services Limited");
        info.short_name = Some("TCS Ltd".to_string());
        assert_eq!(info.display_name("TCS"), "TCS Ltd");
    }

    #[test]
    fn test_sanitized_drops_non_finite() {
        let info = SnapshotInfo {
            trailing_pe: Some(f64::NAN),
            beta: Some(f64::INFINITY),
            market_cap: Some(1.0e12),
            ..Default::default()
        }
        .sanitized();
        assert_eq!(info.trailing_pe, None);
        assert_eq!(info.beta, None);
        assert_eq!(info.market_cap, Some(1.0e12));
    }
}
