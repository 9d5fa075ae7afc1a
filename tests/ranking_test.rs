use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

use stockanalyzer::groups;
use stockanalyzer::models::{FinancialStatements, SnapshotInfo, StatementSet, StatementTable};
use stockanalyzer::persistence::{MemorySnapshotStore, SnapshotBackend, SnapshotStore};
use stockanalyzer::provider::MemoryProvider;
use stockanalyzer::ranking::{MemberStatus, RankingEngine, RankingEvent, SkipReason};
use stockanalyzer::{Market, MarketCalendar};

fn latest_year() -> Vec<NaiveDate> {
    vec![NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()]
}

/// Reported EBIT against a fixed balance sheet with 500 of invested capital
fn statements(ebit: f64) -> FinancialStatements {
    FinancialStatements {
        annual: StatementSet {
            income: StatementTable::with_periods(latest_year()).insert_row("Operating Income", &[ebit]),
            balance_sheet: StatementTable::with_periods(latest_year())
                .insert_row("Total Current Assets", &[300.0])
                .insert_row("Total Current Liabilities", &[100.0])
                .insert_row("Total Assets", &[600.0]),
            cash_flow: StatementTable::default(),
        },
        quarterly: StatementSet::default(),
    }
}

fn info(name: &str, enterprise_value: f64) -> SnapshotInfo {
    SnapshotInfo {
        long_name: Some(name.to_string()),
        regular_market_price: Some(250.0),
        enterprise_value: Some(enterprise_value),
        market_cap: Some(2.5e12),
        ..SnapshotInfo::default()
    }
}

fn provider() -> Arc<MemoryProvider> {
    Arc::new(
        MemoryProvider::new()
            .with_info("AAPL", info("Apple", 1_000.0))
            .with_statements("AAPL", statements(120.0))
            .with_info("MSFT", info("Microsoft", 800.0))
            .with_statements("MSFT", statements(100.0))
            .with_info("AMZN", info("Amazon", 2_000.0))
            .with_statements("AMZN", statements(60.0))
            .with_info("NVDA", info("Nvidia", -10.0))
            .with_statements("NVDA", statements(300.0)),
    )
}

fn basket() -> Vec<String> {
    ["AAPL", "MSFT", "AMZN", "NVDA", "GOOGL"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

async fn collect(rx: &mut mpsc::Receiver<RankingEvent>) -> Vec<RankingEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_stream_reports_every_member_then_result() {
    let engine = RankingEngine::new(provider(), MarketCalendar::default()).with_batch_size(2);
    let (tx, mut rx) = mpsc::channel(4);
    let members = basket();

    let producer = async {
        let tx = tx;
        engine.rank_symbols(&members, Market::Us, &tx).await
    };
    let (rankings, events) = tokio::join!(producer, collect(&mut rx));
    let rankings = rankings.unwrap();

    assert_eq!(events.len(), members.len() + 1);
    for (i, event) in events[..members.len()].iter().enumerate() {
        match event {
            RankingEvent::Progress { current, total, symbol, .. } => {
                assert_eq!(*current, i + 1);
                assert_eq!(*total, 5);
                assert_eq!(symbol, &members[i]);
            }
            other => panic!("expected progress, got {:?}", other),
        }
    }

    let skipped: Vec<(&str, Option<SkipReason>)> = events
        .iter()
        .filter_map(|e| match e {
            RankingEvent::Progress {
                symbol,
                status: MemberStatus::Skipped,
                reason,
                ..
            } => Some((symbol.as_str(), *reason)),
            _ => None,
        })
        .collect();
    assert_eq!(
        skipped,
        vec![
            ("NVDA", Some(SkipReason::NoEnterpriseValue)),
            ("GOOGL", Some(SkipReason::FetchFailed)),
        ]
    );

    // EY: MSFT 12.5%, AAPL 12%, AMZN 3%. ROIC: AAPL 24%, MSFT 20%, AMZN 12%.
    let order: Vec<&str> = rankings.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(order, vec!["AAPL", "MSFT", "AMZN"]);
    assert_eq!(rankings[0].name, "Apple");
    assert_eq!(rankings[2].combined_rank, 6);

    match events.last() {
        Some(RankingEvent::Result { rankings: streamed, from_cache }) => {
            assert!(!from_cache);
            assert_eq!(streamed, &rankings);
        }
        other => panic!("expected result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ranking_repeatable_across_batch_sizes() {
    let (tx, _rx) = mpsc::channel(64);
    let members = basket();

    let mut runs = Vec::new();
    for batch_size in [1, 2, 10] {
        let engine = RankingEngine::new(provider(), MarketCalendar::default()).with_batch_size(batch_size);
        runs.push(engine.rank_symbols(&members, Market::Us, &tx).await.unwrap());
    }
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}

#[tokio::test]
async fn test_group_ranking_reuses_session_snapshot() {
    let provider = provider();
    let engine = RankingEngine::new(provider.clone(), MarketCalendar::default());
    let store = SnapshotBackend::Memory(MemorySnapshotStore::new());
    let members = basket();
    // 13:00 IST is past the 05:00 US cutoff
    let now = Utc.with_ymd_and_hms(2025, 6, 3, 7, 30, 0).unwrap();

    let (tx, mut rx) = mpsc::channel(64);
    let first = engine
        .rank_group_at(&store, "watchlist", &members, Market::Us, &tx, now)
        .await
        .unwrap();
    let calls = provider.calls();

    let second = engine
        .rank_group_at(&store, "watchlist", &members, Market::Us, &tx, now)
        .await
        .unwrap();
    drop(tx);

    assert_eq!(first, second);
    assert_eq!(provider.calls(), calls);

    let events = collect(&mut rx).await;
    let results: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            RankingEvent::Result { from_cache, .. } => Some(*from_cache),
            _ => None,
        })
        .collect();
    assert_eq!(results, vec![false, true]);

    let dates = store.list_dates("watchlist", Market::Us).await.unwrap();
    assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()]);
}

#[tokio::test]
async fn test_builtin_group_members_are_all_reported() {
    let group = groups::find(Market::India, "sensex").unwrap();
    // no fixtures: every member is skipped, none raises
    let engine = RankingEngine::new(MemoryProvider::new(), MarketCalendar::default());
    let (tx, mut rx) = mpsc::channel(64);

    let members = group.symbols();
    let producer = async {
        let tx = tx;
        engine.rank_symbols(&members, Market::India, &tx).await
    };
    let (rankings, events) = tokio::join!(producer, collect(&mut rx));

    assert!(rankings.unwrap().is_empty());
    let progress = events
        .iter()
        .filter(|e| matches!(e, RankingEvent::Progress { status: MemberStatus::Skipped, .. }))
        .count();
    assert_eq!(progress, group.len());
}
