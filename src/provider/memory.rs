use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::AnalysisError;
use crate::market::Market;
use crate::models::{FinancialStatements, PriceSeries, SnapshotInfo};
use crate::Result;

use super::{DataProvider, PricePeriod};

/// Fixture-backed provider for tests and offline runs.
///
/// Fixtures are keyed by bare upper-cased ticker and served for any market
/// and period. Unknown tickers fail with `NotFound`.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    prices: HashMap<String, PriceSeries>,
    info: HashMap<String, SnapshotInfo>,
    statements: HashMap<String, FinancialStatements>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a series under its own symbol
    pub fn with_prices(mut self, series: PriceSeries) -> Self {
        self.prices.insert(normalize(series.symbol()), series);
        self
    }

    pub fn with_info(mut self, symbol: &str, info: SnapshotInfo) -> Self {
        self.info.insert(normalize(symbol), info);
        self
    }

    pub fn with_statements(mut self, symbol: &str, statements: FinancialStatements) -> Self {
        self.statements.insert(normalize(symbol), statements);
        self
    }

    /// Every fetch for `symbol` fails with a provider error
    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(normalize(symbol));
        self
    }

    /// Number of fetches served, failures included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup<T: Clone>(
        &self,
        fixtures: &HashMap<String, T>,
        symbol: &str,
        market: Market,
    ) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = normalize(symbol);

        if self.failing.contains(&key) {
            return Err(AnalysisError::Provider(format!(
                "simulated failure for {}",
                market.provider_symbol(symbol)
            )));
        }

        fixtures
            .get(&key)
            .cloned()
            .ok_or_else(|| AnalysisError::not_found(market.provider_symbol(symbol)))
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl DataProvider for MemoryProvider {
    async fn fetch_price_series(
        &self,
        symbol: &str,
        market: Market,
        _period: PricePeriod,
    ) -> Result<PriceSeries> {
        let series = self.lookup(&self.prices, symbol, market)?;
        if series.is_empty() {
            return Err(AnalysisError::not_found(market.provider_symbol(symbol)));
        }
        Ok(series)
    }

    async fn fetch_snapshot_info(&self, symbol: &str, market: Market) -> Result<SnapshotInfo> {
        let info = self.lookup(&self.info, symbol, market)?;
        if info.price().is_none() {
            return Err(AnalysisError::not_found(market.provider_symbol(symbol)));
        }
        Ok(info)
    }

    async fn fetch_statements(&self, symbol: &str, market: Market) -> Result<FinancialStatements> {
        self.lookup(&self.statements, symbol, market)
    }
}
