use chrono::{Datelike, NaiveDate};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, RedisError};
use tokio::time::{timeout, Duration};

use crate::market::Market;
use crate::Result;

use super::{GroupSnapshot, SnapshotStore};

/// Redis snapshot storage
///
/// Each snapshot is a JSON string at `group_snapshot:{group}:{market}:{date}`.
/// A sorted set `group_snapshot_dates:{group}:{market}` indexes the dates,
/// scored by day number.
#[derive(Clone)]
pub struct RedisSnapshotStore {
    conn: ConnectionManager,
}

fn snapshot_key(group_id: &str, market: Market, date: NaiveDate) -> String {
    format!("group_snapshot:{}:{}:{}", group_id, market.code(), date)
}

fn dates_key(group_id: &str, market: Market) -> String {
    format!("group_snapshot_dates:{}:{}", group_id, market.code())
}

fn date_score(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

impl RedisSnapshotStore {
    /// Connect with a 5 second timeout
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                RedisError::from((ErrorKind::IoError, "Redis connection timeout after 5 seconds"))
            })??;

        tracing::info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    /// Remove a group's snapshots; returns how many were deleted
    pub async fn clear_group(&self, group_id: &str, market: Market) -> Result<usize> {
        let mut conn = self.conn.clone();
        let dates = self.list_dates(group_id, market).await?;

        for date in &dates {
            conn.del::<_, ()>(snapshot_key(group_id, market, *date)).await?;
        }
        conn.del::<_, ()>(dates_key(group_id, market)).await?;

        if !dates.is_empty() {
            tracing::debug!("Cleared {} snapshots for {}", dates.len(), group_id);
        }
        Ok(dates.len())
    }
}

impl SnapshotStore for RedisSnapshotStore {
    async fn save(&self, snapshot: &GroupSnapshot) -> Result<()> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(snapshot)?;

        conn.set::<_, _, ()>(
            snapshot_key(&snapshot.group_id, snapshot.market, snapshot.session_date),
            value,
        )
        .await?;
        conn.zadd::<_, _, _, ()>(
            dates_key(&snapshot.group_id, snapshot.market),
            snapshot.session_date.to_string(),
            date_score(snapshot.session_date),
        )
        .await?;

        tracing::info!(
            "Saved {} snapshot for {} to Redis",
            snapshot.group_id,
            snapshot.session_date
        );
        Ok(())
    }

    async fn load(
        &self,
        group_id: &str,
        market: Market,
        session_date: NaiveDate,
    ) -> Result<Option<GroupSnapshot>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(snapshot_key(group_id, market, session_date)).await?;

        let snapshot = value
            .map(|json| serde_json::from_str::<GroupSnapshot>(&json))
            .transpose()?;
        if snapshot.is_some() {
            tracing::info!("Loaded {} snapshot for {} from Redis", group_id, session_date);
        }
        Ok(snapshot)
    }

    async fn list_dates(&self, group_id: &str, market: Market) -> Result<Vec<NaiveDate>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.zrevrange(dates_key(group_id, market), 0, -1).await?;

        let mut dates = Vec::with_capacity(members.len());
        for member in members {
            match member.parse::<NaiveDate>() {
                Ok(date) => dates.push(date),
                Err(e) => tracing::warn!("Skipping malformed snapshot date {}: {}", member, e),
            }
        }
        Ok(dates)
    }
}
