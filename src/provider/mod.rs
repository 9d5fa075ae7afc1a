// Data provider contracts and implementations
//
// Analyzers only see these three reads. Retries and timeouts belong to the
// implementations, never to the analysis core.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::market::Market;
use crate::models::{FinancialStatements, PriceSeries, SnapshotInfo};
use crate::Result;

pub mod cached;
pub mod memory;
pub mod yahoo;

pub use cached::CachedProvider;
pub use memory::MemoryProvider;
pub use yahoo::YahooClient;

/// History window for daily price series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PricePeriod {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl PricePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricePeriod::OneMonth => "1mo",
            PricePeriod::ThreeMonths => "3mo",
            PricePeriod::SixMonths => "6mo",
            PricePeriod::OneYear => "1y",
            PricePeriod::TwoYears => "2y",
            PricePeriod::FiveYears => "5y",
        }
    }
}

impl fmt::Display for PricePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricePeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1mo" => Ok(PricePeriod::OneMonth),
            "3mo" => Ok(PricePeriod::ThreeMonths),
            "6mo" => Ok(PricePeriod::SixMonths),
            "1y" => Ok(PricePeriod::OneYear),
            "2y" => Ok(PricePeriod::TwoYears),
            "5y" => Ok(PricePeriod::FiveYears),
            other => Err(AnalysisError::InvalidInput(format!(
                "unsupported period {}",
                other
            ))),
        }
    }
}

/// Read-only market data source
///
/// `symbol` is the bare ticker (e.g. "RELIANCE"); implementations add the
/// market suffix themselves.
pub trait DataProvider: Send + Sync {
    /// Daily OHLCV bars. `NotFound` if the series is empty.
    fn fetch_price_series(
        &self,
        symbol: &str,
        market: Market,
        period: PricePeriod,
    ) -> impl Future<Output = Result<PriceSeries>> + Send;

    /// Snapshot fundamentals. `NotFound` if no market price resolves.
    fn fetch_snapshot_info(
        &self,
        symbol: &str,
        market: Market,
    ) -> impl Future<Output = Result<SnapshotInfo>> + Send;

    /// Annual and quarterly statements. `NotFound` under the same condition
    /// as `fetch_snapshot_info`.
    fn fetch_statements(
        &self,
        symbol: &str,
        market: Market,
    ) -> impl Future<Output = Result<FinancialStatements>> + Send;
}

impl<P: DataProvider> DataProvider for std::sync::Arc<P> {
    fn fetch_price_series(
        &self,
        symbol: &str,
        market: Market,
        period: PricePeriod,
    ) -> impl Future<Output = Result<PriceSeries>> + Send {
        (**self).fetch_price_series(symbol, market, period)
    }

    fn fetch_snapshot_info(
        &self,
        symbol: &str,
        market: Market,
    ) -> impl Future<Output = Result<SnapshotInfo>> + Send {
        (**self).fetch_snapshot_info(symbol, market)
    }

    fn fetch_statements(
        &self,
        symbol: &str,
        market: Market,
    ) -> impl Future<Output = Result<FinancialStatements>> + Send {
        (**self).fetch_statements(symbol, market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse() {
        assert_eq!("1y".parse::<PricePeriod>().unwrap(), PricePeriod::OneYear);
        assert_eq!("6MO".parse::<PricePeriod>().unwrap(), PricePeriod::SixMonths);
        assert!("10y".parse::<PricePeriod>().is_err());
        assert_eq!(PricePeriod::default().to_string(), "1y");
    }
}
