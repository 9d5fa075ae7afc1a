// Ranking snapshot storage
//
// One snapshot per (group, market, session date). Saving the same key again
// replaces the stored ranking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::market::Market;
use crate::models::RankingEntry;
use crate::Result;

pub mod postgres_store;
pub mod redis_store;

pub use postgres_store::PostgresSnapshotStore;
pub use redis_store::RedisSnapshotStore;

/// Ranking of a named group for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub group_id: String,
    pub market: Market,
    pub session_date: NaiveDate,
    /// Basket members as requested, in request order
    pub symbols: Vec<String>,
    pub rankings: Vec<RankingEntry>,
    pub created_at: DateTime<Utc>,
}

impl GroupSnapshot {
    pub fn new(
        group_id: &str,
        market: Market,
        session_date: NaiveDate,
        symbols: &[String],
        rankings: Vec<RankingEntry>,
    ) -> Self {
        Self {
            group_id: group_id.to_string(),
            market,
            session_date,
            symbols: symbols.to_vec(),
            rankings,
            created_at: Utc::now(),
        }
    }

    /// Set equality of the stored basket and `symbols`; order and repeats
    /// are ignored
    pub fn same_symbols(&self, symbols: &[String]) -> bool {
        let stored: BTreeSet<&str> = self.symbols.iter().map(String::as_str).collect();
        let requested: BTreeSet<&str> = symbols.iter().map(String::as_str).collect();
        stored == requested
    }
}

/// Persistent store for group ranking snapshots
pub trait SnapshotStore: Send + Sync {
    /// Insert or replace the snapshot for its (group, market, date)
    fn save(&self, snapshot: &GroupSnapshot) -> impl Future<Output = Result<()>> + Send;

    fn load(
        &self,
        group_id: &str,
        market: Market,
        session_date: NaiveDate,
    ) -> impl Future<Output = Result<Option<GroupSnapshot>>> + Send;

    /// Session dates with a stored snapshot, most recent first
    fn list_dates(
        &self,
        group_id: &str,
        market: Market,
    ) -> impl Future<Output = Result<Vec<NaiveDate>>> + Send;
}

type SnapshotKey = (String, Market);

/// Process-local store, used in tests and when no backend is configured
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<SnapshotKey, BTreeMap<NaiveDate, GroupSnapshot>>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots
            .read()
            .map(|s| s.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &GroupSnapshot) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshots
            .entry((snapshot.group_id.clone(), snapshot.market))
            .or_default()
            .insert(snapshot.session_date, snapshot.clone());

        tracing::info!(
            "Saved {} snapshot for {} ({} rankings)",
            snapshot.group_id,
            snapshot.session_date,
            snapshot.rankings.len()
        );
        Ok(())
    }

    async fn load(
        &self,
        group_id: &str,
        market: Market,
        session_date: NaiveDate,
    ) -> Result<Option<GroupSnapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(snapshots
            .get(&(group_id.to_string(), market))
            .and_then(|by_date| by_date.get(&session_date))
            .cloned())
    }

    async fn list_dates(&self, group_id: &str, market: Market) -> Result<Vec<NaiveDate>> {
        let snapshots = self
            .snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(snapshots
            .get(&(group_id.to_string(), market))
            .map(|by_date| by_date.keys().rev().copied().collect())
            .unwrap_or_default())
    }
}

/// Backend chosen at runtime from configuration
pub enum SnapshotBackend {
    Memory(MemorySnapshotStore),
    Redis(RedisSnapshotStore),
    Postgres(PostgresSnapshotStore),
}

impl SnapshotBackend {
    /// Postgres when a database URL is set, else Redis, else in-memory
    pub async fn connect(database_url: Option<&str>, redis_url: Option<&str>) -> Result<Self> {
        if let Some(url) = database_url {
            return Ok(Self::Postgres(PostgresSnapshotStore::new(url).await?));
        }
        if let Some(url) = redis_url {
            return Ok(Self::Redis(RedisSnapshotStore::new(url).await?));
        }
        Ok(Self::Memory(MemorySnapshotStore::new()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
            Self::Postgres(_) => "postgres",
        }
    }
}

impl SnapshotStore for SnapshotBackend {
    async fn save(&self, snapshot: &GroupSnapshot) -> Result<()> {
        match self {
            Self::Memory(store) => store.save(snapshot).await,
            Self::Redis(store) => store.save(snapshot).await,
            Self::Postgres(store) => store.save(snapshot).await,
        }
    }

    async fn load(
        &self,
        group_id: &str,
        market: Market,
        session_date: NaiveDate,
    ) -> Result<Option<GroupSnapshot>> {
        match self {
            Self::Memory(store) => store.load(group_id, market, session_date).await,
            Self::Redis(store) => store.load(group_id, market, session_date).await,
            Self::Postgres(store) => store.load(group_id, market, session_date).await,
        }
    }

    async fn list_dates(&self, group_id: &str, market: Market) -> Result<Vec<NaiveDate>> {
        match self {
            Self::Memory(store) => store.list_dates(group_id, market).await,
            Self::Redis(store) => store.list_dates(group_id, market).await,
            Self::Postgres(store) => store.list_dates(group_id, market).await,
        }
    }
}
