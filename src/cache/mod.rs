//! Session-aware memoization of provider results.
//!
//! Entries stay valid until the owning market's next session boundary has
//! passed. Staleness is checked lazily on `get`; `set` also sweeps every
//! entry that is stale at insertion time.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::market::MarketCalendar;

/// Cache key: operation, upper-cased symbol and market, and an
/// order-independent parameter set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    op: String,
    symbol: String,
    market: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new<I, K, V>(op: &str, symbol: &str, market: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            op: op.to_string(),
            symbol: symbol.trim().to_ascii_uppercase(),
            market: market.trim().to_ascii_uppercase(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Key for an operation without parameters
    pub fn simple(op: &str, symbol: &str, market: &str) -> Self {
        Self::new(op, symbol, market, std::iter::empty::<(String, String)>())
    }

    pub fn market(&self) -> &str {
        &self.market
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    payload: V,
    fetched_at: DateTime<Utc>,
}

/// Thread-safe session cache shared by clones
#[derive(Debug, Clone)]
pub struct SessionCache<V> {
    calendar: Arc<MarketCalendar>,
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry<V>>>>,
}

impl<V: Clone> SessionCache<V> {
    pub fn new(calendar: MarketCalendar) -> Self {
        Self {
            calendar: Arc::new(calendar),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn calendar(&self) -> &MarketCalendar {
        &self.calendar
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    /// Payload for `key` if it was fetched at or after the market's latest
    /// boundary as of `now`. A stale entry is removed.
    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<V> {
        let boundary = self.calendar.session_boundary(key.market(), now);

        {
            let entries = self.read();
            match entries.get(key) {
                None => {
                    tracing::debug!("Cache miss: {} {} {}", key.op, key.symbol, key.market);
                    return None;
                }
                Some(entry) if entry.fetched_at >= boundary => {
                    tracing::debug!("Cache hit: {} {} {}", key.op, key.symbol, key.market);
                    return Some(entry.payload.clone());
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock; a concurrent `set` may have refreshed it
        let mut entries = self.write();
        match entries.get(key) {
            Some(entry) if entry.fetched_at >= boundary => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                tracing::debug!(
                    "Evicted stale entry: {} {} {} (boundary {})",
                    key.op,
                    key.symbol,
                    key.market,
                    boundary
                );
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: CacheKey, payload: V) {
        self.set_at(key, payload, Utc::now())
    }

    /// Store `payload` stamped with `now`, replacing any previous entry
    pub fn set_at(&self, key: CacheKey, payload: V, now: DateTime<Utc>) {
        let mut entries = self.write();

        let before = entries.len();
        let calendar = &self.calendar;
        entries.retain(|k, entry| entry.fetched_at >= calendar.session_boundary(k.market(), now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!("Purged {} stale cache entries", purged);
        }

        entries.insert(
            key,
            CacheEntry {
                payload,
                fetched_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    // A panic while holding the lock cannot leave an entry half-written,
    // so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ist(d: u32, h: u32, min: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(2024, 3, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn cache() -> SessionCache<Vec<f64>> {
        SessionCache::new(MarketCalendar::default())
    }

    #[test]
    fn test_key_normalization() {
        let a = CacheKey::new("price_series", "reliance", "in", [("period", "1y"), ("x", "2")]);
        let b = CacheKey::new("price_series", "RELIANCE", "IN", [("x", "2"), ("period", "1y")]);
        assert_eq!(a, b);

        let c = CacheKey::new("price_series", "RELIANCE", "IN", [("period", "6mo")]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_get_before_boundary_returns_payload() {
        let cache = cache();
        let key = CacheKey::simple("snapshot_info", "TCS", "IN");

        cache.set_at(key.clone(), vec![1.0, 2.0], ist(12, 10, 0));
        assert_eq!(cache.get_at(&key, ist(12, 15, 59)), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_get_after_boundary_evicts() {
        let cache = cache();
        let key = CacheKey::simple("snapshot_info", "TCS", "IN");

        cache.set_at(key.clone(), vec![1.0], ist(12, 10, 0));
        assert_eq!(cache.get_at(&key, ist(12, 16, 1)), None);
        assert!(cache.is_empty());

        // A fresh set after eviction holds only the new payload
        cache.set_at(key.clone(), vec![9.0], ist(12, 16, 5));
        assert_eq!(cache.get_at(&key, ist(12, 18, 0)), Some(vec![9.0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fetched_after_cutoff_survives_until_next_day() {
        let cache = cache();
        let key = CacheKey::simple("statements", "INFY", "IN");

        cache.set_at(key.clone(), vec![3.0], ist(12, 16, 30));
        assert_eq!(cache.get_at(&key, ist(13, 15, 0)), Some(vec![3.0]));
        assert_eq!(cache.get_at(&key, ist(13, 16, 0)), None);
    }

    #[test]
    fn test_markets_have_independent_boundaries() {
        let cache = cache();
        let us = CacheKey::simple("snapshot_info", "AAPL", "US");
        let india = CacheKey::simple("snapshot_info", "TCS", "IN");

        cache.set_at(us.clone(), vec![1.0], ist(12, 4, 0));
        cache.set_at(india.clone(), vec![2.0], ist(12, 4, 0));

        // 06:00 IST is past the US cutoff but not the Indian one
        let now = ist(12, 6, 0);
        assert_eq!(cache.get_at(&us, now), None);
        assert_eq!(cache.get_at(&india, now), Some(vec![2.0]));
    }

    #[test]
    fn test_set_purges_stale_entries() {
        let cache = cache();
        let old = CacheKey::simple("snapshot_info", "OLD", "IN");
        let new = CacheKey::simple("snapshot_info", "NEW", "IN");

        cache.set_at(old, vec![1.0], ist(11, 12, 0));
        cache.set_at(new.clone(), vec![2.0], ist(12, 17, 0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&new, ist(12, 17, 0)), Some(vec![2.0]));
    }

    #[test]
    fn test_set_overwrites() {
        let cache = cache();
        let key = CacheKey::simple("statements", "TCS", "IN");
        let now = ist(12, 17, 0);

        cache.set_at(key.clone(), vec![1.0], now);
        cache.set_at(key.clone(), vec![2.0], now + Duration::minutes(1));
        assert_eq!(cache.get_at(&key, now + Duration::minutes(2)), Some(vec![2.0]));
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = cache();
        let shared = cache.clone();
        let key = CacheKey::simple("snapshot_info", "TCS", "IN");

        cache.set(key.clone(), vec![5.0]);
        assert_eq!(shared.get(&key), Some(vec![5.0]));
    }
}
