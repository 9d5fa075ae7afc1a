// Cross-sectional "Magic Formula" ranking over a basket of symbols.
//
// Earnings yield (EBIT / EV) and return on invested capital rank each member
// twice; the sum of both ranks orders the basket. Members without usable
// inputs are skipped and reported, never raised.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::market::{Market, MarketCalendar};
use crate::models::{FinancialStatements, LineItem, RankingEntry, SnapshotInfo};
use crate::persistence::{GroupSnapshot, SnapshotStore};
use crate::provider::DataProvider;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Valuation inputs for one basket member
#[derive(Debug, Clone, PartialEq)]
pub struct MagicFormulaMetrics {
    pub symbol: String,
    pub name: String,
    pub earnings_yield: f64,
    pub roic: f64,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
}

/// Why a member was left out of the ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed,
    NoStatements,
    NoEbit,
    NoEnterpriseValue,
    MissingCapitalInputs,
    NonPositiveInvestedCapital,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::FetchFailed => "data unavailable",
            SkipReason::NoStatements => "no annual statements",
            SkipReason::NoEbit => "EBIT not derivable",
            SkipReason::NoEnterpriseValue => "enterprise value missing or not positive",
            SkipReason::MissingCapitalInputs => "balance sheet incomplete",
            SkipReason::NonPositiveInvestedCapital => "invested capital not positive",
        };
        f.write_str(text)
    }
}

/// EBIT as reported, else gross profit less operating expense, else gross profit
fn ebit(statements: &FinancialStatements) -> Option<f64> {
    let income = &statements.annual.income;
    if let Some(ebit) = income.value(0, LineItem::Ebit) {
        return Some(ebit);
    }

    let revenue = income.value(0, LineItem::TotalRevenue)?;
    let cost = income.value(0, LineItem::CostOfRevenue)?;
    let gross_profit = revenue - cost;

    Some(match income.value(0, LineItem::OperatingExpense) {
        Some(opex) => gross_profit - opex,
        None => gross_profit,
    })
}

/// Earnings yield and ROIC from the latest annual column
pub fn compute_metrics(
    symbol: &str,
    info: &SnapshotInfo,
    statements: &FinancialStatements,
) -> Result<MagicFormulaMetrics, SkipReason> {
    let annual = &statements.annual;
    if annual.income.is_empty() || annual.balance_sheet.is_empty() {
        return Err(SkipReason::NoStatements);
    }

    let ebit = ebit(statements).ok_or(SkipReason::NoEbit)?;

    let enterprise_value = info
        .enterprise_value
        .filter(|ev| ev.is_finite() && *ev > 0.0)
        .ok_or(SkipReason::NoEnterpriseValue)?;

    let balance = &annual.balance_sheet;
    let (Some(current_assets), Some(current_liabilities), Some(total_assets)) = (
        balance.value(0, LineItem::CurrentAssets),
        balance.value(0, LineItem::CurrentLiabilities),
        balance.value(0, LineItem::TotalAssets),
    ) else {
        return Err(SkipReason::MissingCapitalInputs);
    };

    let net_working_capital = current_assets - current_liabilities;
    let net_fixed_assets = total_assets - current_assets;
    let invested_capital = net_working_capital + net_fixed_assets;
    if invested_capital <= 0.0 {
        return Err(SkipReason::NonPositiveInvestedCapital);
    }

    Ok(MagicFormulaMetrics {
        symbol: symbol.to_string(),
        name: info.display_name(symbol),
        earnings_yield: ebit / enterprise_value,
        roic: ebit / invested_capital,
        price: info.price(),
        market_cap: info.market_cap,
        pe_ratio: info.trailing_pe,
    })
}

/// 1-based rank of each element under a descending sort on `key`.
/// Equal keys keep input order.
fn descending_ranks(metrics: &[MagicFormulaMetrics], key: fn(&MagicFormulaMetrics) -> f64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..metrics.len()).collect();
    order.sort_by(|&a, &b| key(&metrics[b]).total_cmp(&key(&metrics[a])));

    let mut ranks = vec![0; metrics.len()];
    for (position, &index) in order.iter().enumerate() {
        ranks[index] = position + 1;
    }
    ranks
}

/// Rank valid members by combined earnings-yield and ROIC rank.
///
/// Deterministic: every sort is stable over the input order, so ties resolve
/// to whichever member came first in the basket.
pub fn rank(metrics: Vec<MagicFormulaMetrics>) -> Vec<RankingEntry> {
    let ey_ranks = descending_ranks(&metrics, |m| m.earnings_yield);
    let roic_ranks = descending_ranks(&metrics, |m| m.roic);

    let mut entries: Vec<RankingEntry> = metrics
        .into_iter()
        .zip(ey_ranks.into_iter().zip(roic_ranks))
        .map(|(m, (ey_rank, roic_rank))| RankingEntry {
            rank: 0,
            symbol: m.symbol,
            name: m.name,
            earnings_yield: m.earnings_yield,
            roic: m.roic,
            price: m.price,
            market_cap: m.market_cap,
            pe_ratio: m.pe_ratio,
            ey_rank,
            roic_rank,
            combined_rank: ey_rank + roic_rank,
        })
        .collect();

    entries.sort_by_key(|entry| entry.combined_rank);
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank = position + 1;
    }
    entries
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Ok,
    Skipped,
}

/// Streamed while a basket is ranked: one `Progress` per member in basket
/// order, then exactly one `Result`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RankingEvent {
    Progress {
        current: usize,
        total: usize,
        symbol: String,
        status: MemberStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<SkipReason>,
    },
    Result {
        rankings: Vec<RankingEntry>,
        from_cache: bool,
    },
}

/// Fetches basket members in concurrent batches and ranks them
pub struct RankingEngine<P> {
    provider: P,
    calendar: MarketCalendar,
    batch_size: usize,
}

impl<P: DataProvider> RankingEngine<P> {
    pub fn new(provider: P, calendar: MarketCalendar) -> Self {
        Self {
            provider,
            calendar,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn member_metrics(
        &self,
        symbol: &str,
        market: Market,
    ) -> Result<MagicFormulaMetrics, SkipReason> {
        let fetched = tokio::try_join!(
            self.provider.fetch_statements(symbol, market),
            self.provider.fetch_snapshot_info(symbol, market),
        );

        let (statements, info) = fetched.map_err(|e| {
            warn!("Skipping {}: {}", symbol, e);
            SkipReason::FetchFailed
        })?;

        compute_metrics(symbol, &info, &statements).inspect_err(|reason| {
            warn!("Skipping {}: {}", symbol, reason);
        })
    }

    /// Rank `symbols`, streaming progress to `events`.
    ///
    /// Returns `None` if the receiver went away before the ranking finished.
    pub async fn rank_symbols(
        &self,
        symbols: &[String],
        market: Market,
        events: &mpsc::Sender<RankingEvent>,
    ) -> Option<Vec<RankingEntry>> {
        let rankings = self.compute(symbols, market, events).await?;
        emit(
            events,
            RankingEvent::Result {
                rankings: rankings.clone(),
                from_cache: false,
            },
        )
        .await?;
        Some(rankings)
    }

    async fn compute(
        &self,
        symbols: &[String],
        market: Market,
        events: &mpsc::Sender<RankingEvent>,
    ) -> Option<Vec<RankingEntry>> {
        let total = symbols.len();
        let mut valid = Vec::with_capacity(total);
        let mut current = 0;

        info!("Ranking {} symbols ({})", total, market.code());

        for batch in symbols.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|symbol| self.member_metrics(symbol, market))).await;

            for (symbol, result) in batch.iter().zip(results) {
                current += 1;
                let (status, reason) = match result {
                    Ok(metrics) => {
                        valid.push(metrics);
                        (MemberStatus::Ok, None)
                    }
                    Err(reason) => (MemberStatus::Skipped, Some(reason)),
                };

                emit(
                    events,
                    RankingEvent::Progress {
                        current,
                        total,
                        symbol: symbol.clone(),
                        status,
                        reason,
                    },
                )
                .await?;
            }
        }

        info!("Ranked {} of {} symbols", valid.len(), total);
        Some(rank(valid))
    }

    /// Rank a named group, reusing the stored ranking for the current session
    pub async fn rank_group<S: SnapshotStore>(
        &self,
        store: &S,
        group_id: &str,
        symbols: &[String],
        market: Market,
        events: &mpsc::Sender<RankingEvent>,
    ) -> Option<Vec<RankingEntry>> {
        self.rank_group_at(store, group_id, symbols, market, events, Utc::now())
            .await
    }

    /// `rank_group` with an explicit clock
    pub async fn rank_group_at<S: SnapshotStore>(
        &self,
        store: &S,
        group_id: &str,
        symbols: &[String],
        market: Market,
        events: &mpsc::Sender<RankingEvent>,
        now: DateTime<Utc>,
    ) -> Option<Vec<RankingEntry>> {
        let session_date = self.calendar.session_date(market.code(), now);

        match store.load(group_id, market, session_date).await {
            Ok(Some(snapshot)) if snapshot.same_symbols(symbols) => {
                info!("Reusing {} ranking for {}", group_id, session_date);
                emit(
                    events,
                    RankingEvent::Result {
                        rankings: snapshot.rankings.clone(),
                        from_cache: true,
                    },
                )
                .await?;
                return Some(snapshot.rankings);
            }
            Ok(Some(_)) => debug!("Stored {} basket differs, recomputing", group_id),
            Ok(None) => {}
            Err(e) => warn!("Snapshot load failed for {}: {}", group_id, e),
        }

        let rankings = self.compute(symbols, market, events).await?;

        let snapshot = GroupSnapshot::new(group_id, market, session_date, symbols, rankings.clone());
        if let Err(e) = store.save(&snapshot).await {
            warn!("Snapshot save failed for {}: {}", group_id, e);
        }

        emit(
            events,
            RankingEvent::Result {
                rankings: rankings.clone(),
                from_cache: false,
            },
        )
        .await?;
        Some(rankings)
    }
}

async fn emit(events: &mpsc::Sender<RankingEvent>, event: RankingEvent) -> Option<()> {
    match events.send(event).await {
        Ok(()) => Some(()),
        Err(_) => {
            debug!("Ranking consumer dropped, stopping");
            None
        }
    }
}
