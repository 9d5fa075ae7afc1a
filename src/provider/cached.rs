use crate::cache::{CacheKey, SessionCache};
use crate::market::{Market, MarketCalendar};
use crate::models::{FinancialStatements, PriceSeries, SnapshotInfo};
use crate::Result;

use super::{DataProvider, PricePeriod};

const OP_PRICE_SERIES: &str = "price_series";
const OP_SNAPSHOT_INFO: &str = "snapshot_info";
const OP_STATEMENTS: &str = "statements";

#[derive(Debug, Clone)]
enum Payload {
    Prices(PriceSeries),
    Info(SnapshotInfo),
    Statements(FinancialStatements),
}

/// Fronts any provider with a session cache. Errors pass through uncached.
#[derive(Debug, Clone)]
pub struct CachedProvider<P> {
    inner: P,
    cache: SessionCache<Payload>,
}

impl<P: DataProvider> CachedProvider<P> {
    pub fn new(inner: P, calendar: MarketCalendar) -> Self {
        Self {
            inner,
            cache: SessionCache::new(calendar),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn calendar(&self) -> &MarketCalendar {
        self.cache.calendar()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl<P: DataProvider> DataProvider for CachedProvider<P> {
    async fn fetch_price_series(
        &self,
        symbol: &str,
        market: Market,
        period: PricePeriod,
    ) -> Result<PriceSeries> {
        let key = CacheKey::new(
            OP_PRICE_SERIES,
            symbol,
            market.code(),
            [("period", period.as_str())],
        );
        if let Some(Payload::Prices(series)) = self.cache.get(&key) {
            return Ok(series);
        }

        let series = self.inner.fetch_price_series(symbol, market, period).await?;
        self.cache.set(key, Payload::Prices(series.clone()));
        Ok(series)
    }

    async fn fetch_snapshot_info(&self, symbol: &str, market: Market) -> Result<SnapshotInfo> {
        let key = CacheKey::simple(OP_SNAPSHOT_INFO, symbol, market.code());
        if let Some(Payload::Info(info)) = self.cache.get(&key) {
            return Ok(info);
        }

        let info = self.inner.fetch_snapshot_info(symbol, market).await?;
        self.cache.set(key, Payload::Info(info.clone()));
        Ok(info)
    }

    async fn fetch_statements(&self, symbol: &str, market: Market) -> Result<FinancialStatements> {
        let key = CacheKey::simple(OP_STATEMENTS, symbol, market.code());
        if let Some(Payload::Statements(statements)) = self.cache.get(&key) {
            return Ok(statements);
        }

        let statements = self.inner.fetch_statements(symbol, market).await?;
        self.cache.set(key, Payload::Statements(statements.clone()));
        Ok(statements)
    }
}
