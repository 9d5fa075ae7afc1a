use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use stockanalyzer::analysis::{format, run_analysis, technical_analysis, AnalysisKind};
use stockanalyzer::config::{AppConfig, DEFAULT_CONFIG_FILE};
use stockanalyzer::groups;
use stockanalyzer::market::Market;
use stockanalyzer::models::{RankingEntry, Section, Signal};
use stockanalyzer::persistence::{MemorySnapshotStore, SnapshotBackend, SnapshotStore};
use stockanalyzer::provider::{CachedProvider, DataProvider, MemoryProvider, PricePeriod, YahooClient};
use stockanalyzer::ranking::{MemberStatus, RankingEngine, RankingEvent};
use stockanalyzer::synthetic::{generate_series, TrendProfile};

#[derive(Parser)]
#[command(name = "stockanalyzer")]
#[command(about = "Technical, fundamental, Piotroski and CAN SLIM stock analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (optional)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one symbol
    Analyze {
        /// Ticker without exchange suffix (e.g. RELIANCE, AAPL)
        symbol: String,

        /// Market code (IN, US)
        #[arg(short, long, default_value = "IN")]
        market: String,

        /// Analyses to run; all of them when omitted
        #[arg(short, long = "kind", value_enum)]
        kinds: Vec<AnalysisKind>,

        /// One JSON object per section
        #[arg(long)]
        json: bool,
    },

    /// Magic Formula ranking of a group or an explicit symbol list
    Rank {
        /// Built-in group id (see `groups`)
        #[arg(short, long, conflicts_with = "symbols", required_unless_present = "symbols")]
        group: Option<String>,

        /// Comma-separated tickers
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        #[arg(short, long, default_value = "IN")]
        market: String,

        #[arg(long)]
        json: bool,
    },

    /// List built-in groups
    Groups {
        #[arg(short, long, default_value = "IN")]
        market: String,
    },

    /// Stored rankings of a group
    History {
        #[arg(short, long)]
        group: String,

        #[arg(short, long, default_value = "IN")]
        market: String,

        /// Session date (YYYY-MM-DD); the latest when omitted
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Technical analysis of a synthetic series, no network needed
    Demo {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, value_enum, default_value = "uptrend")]
        profile: TrendProfile,

        /// Trading days to generate
        #[arg(long, default_value_t = 260)]
        days: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    setup_logging(&config);

    match cli.command {
        Commands::Analyze {
            symbol,
            market,
            kinds,
            json,
        } => analyze(&config, &symbol, Market::from_code(&market), kinds, json).await,
        Commands::Rank {
            group,
            symbols,
            market,
            json,
        } => rank(&config, group.as_deref(), symbols, Market::from_code(&market), json).await,
        Commands::Groups { market } => {
            list_groups(Market::from_code(&market));
            Ok(())
        }
        Commands::History {
            group,
            market,
            date,
        } => history(&config, &group, Market::from_code(&market), date).await,
        Commands::Demo {
            seed,
            profile,
            days,
        } => demo(seed, profile, days).await,
    }
}

// ============================================================================
// Setup
// ============================================================================

fn setup_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn create_provider(config: &AppConfig) -> anyhow::Result<Arc<CachedProvider<YahooClient>>> {
    let calendar = config.calendar().context("Invalid calendar configuration")?;
    let client = YahooClient::new(&config.provider).context("Failed to create Yahoo client")?;
    Ok(Arc::new(CachedProvider::new(client, calendar)))
}

async fn connect_store(config: &AppConfig) -> SnapshotBackend {
    let storage = &config.storage;
    match SnapshotBackend::connect(storage.database_url.as_deref(), storage.redis_url.as_deref()).await {
        Ok(backend) => {
            tracing::info!("Snapshot store: {}", backend.name());
            backend
        }
        Err(e) => {
            tracing::warn!("Snapshot store unavailable ({}), using in-memory store", e);
            SnapshotBackend::Memory(MemorySnapshotStore::new())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn analyze(
    config: &AppConfig,
    symbol: &str,
    market: Market,
    kinds: Vec<AnalysisKind>,
    json: bool,
) -> anyhow::Result<()> {
    let provider = create_provider(config)?;
    let symbol = symbol.trim().to_ascii_uppercase();
    let kinds = if kinds.is_empty() {
        AnalysisKind::ALL.to_vec()
    } else {
        kinds
    };

    prefetch(provider.as_ref(), &symbol, market).await?;

    for kind in kinds {
        if !json {
            println!("\n═══ {} — {} ({}) ═══", kind.title(), symbol, market.label());
        }

        let analysis = match run_analysis(provider.as_ref(), &symbol, market, kind).await {
            Ok(analysis) => analysis,
            Err(e) if e.is_not_found() => bail!(e),
            Err(e) => {
                tracing::warn!("{} analysis failed for {}: {}", kind, symbol, e);
                continue;
            }
        };

        for section in analysis {
            print_section(&section, json)?;
        }
    }

    Ok(())
}

/// Fill the session cache with all three sources at once
async fn prefetch<P: DataProvider>(provider: &P, symbol: &str, market: Market) -> anyhow::Result<()> {
    let (prices, info, statements) = tokio::join!(
        provider.fetch_price_series(symbol, market, PricePeriod::OneYear),
        provider.fetch_snapshot_info(symbol, market),
        provider.fetch_statements(symbol, market),
    );

    if let Err(e) = prices {
        if e.is_not_found() {
            bail!(e);
        }
        tracing::warn!("Price history unavailable for {}: {}", symbol, e);
    }
    if let Err(e) = info {
        tracing::warn!("Snapshot info unavailable for {}: {}", symbol, e);
    }
    if let Err(e) = statements {
        tracing::warn!("Statements unavailable for {}: {}", symbol, e);
    }
    Ok(())
}

async fn rank(
    config: &AppConfig,
    group: Option<&str>,
    symbols: Vec<String>,
    market: Market,
    json: bool,
) -> anyhow::Result<()> {
    let (group_id, symbols) = match group {
        Some(id) => {
            let group = groups::find(market, id)
                .with_context(|| format!("Unknown group {} for market {}", id, market))?;
            (Some(group.id), group.symbols())
        }
        None => {
            let symbols: Vec<String> = symbols
                .iter()
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            (None, symbols)
        }
    };
    if symbols.is_empty() {
        bail!("No symbols to rank");
    }

    let provider = create_provider(config)?;
    let calendar = provider.calendar().clone();
    let engine = RankingEngine::new(provider, calendar).with_batch_size(config.ranking.batch_size);
    let store = connect_store(config).await;

    let (tx, mut rx) = mpsc::channel(64);

    let producer = async {
        let tx = tx;
        match group_id {
            Some(id) => engine.rank_group(&store, id, &symbols, market, &tx).await,
            None => engine.rank_symbols(&symbols, market, &tx).await,
        }
    };

    let consumer = async {
        while let Some(event) = rx.recv().await {
            render_event(&event, market, json)?;
        }
        Ok::<_, anyhow::Error>(())
    };

    let (_, rendered) = tokio::join!(producer, consumer);
    rendered
}

fn list_groups(market: Market) {
    println!("Groups for {}:", market.label());
    for group in groups::list(market) {
        println!("  {:<14} {:<20} {:>4} stocks", group.id, group.name, group.count);
    }
}

async fn history(
    config: &AppConfig,
    group_id: &str,
    market: Market,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let store = connect_store(config).await;
    let dates = store.list_dates(group_id, market).await?;

    if dates.is_empty() {
        println!("No stored rankings for {} ({})", group_id, market);
        return Ok(());
    }

    println!("Stored sessions for {} ({}):", group_id, market);
    for d in &dates {
        println!("  {}", d);
    }

    let Some(session_date) = date.or_else(|| dates.first().copied()) else {
        return Ok(());
    };
    match store.load(group_id, market, session_date).await? {
        Some(snapshot) => {
            println!("\nRanking for {}:", session_date);
            print_rankings(&snapshot.rankings, market);
        }
        None => println!("\nNo ranking stored for {}", session_date),
    }
    Ok(())
}

async fn demo(seed: u64, profile: TrendProfile, days: usize) -> anyhow::Result<()> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).context("invalid start date")?;
    let series = generate_series("DEMO", start, days, profile, seed)?;
    let provider = MemoryProvider::new().with_prices(series);

    println!("\n═══ Technical Analysis — DEMO ({:?}, seed {}) ═══", profile, seed);
    for section in technical_analysis(&provider, "DEMO", Market::India).await? {
        print_section(&section, false)?;
    }
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn signal_marker(signal: Option<Signal>) -> &'static str {
    match signal {
        Some(Signal::Bullish) => "🟢",
        Some(Signal::Bearish) => "🔴",
        Some(Signal::Neutral) => "🟡",
        Some(Signal::Info) => "ℹ️ ",
        None => "  ",
    }
}

fn print_section(section: &Section, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(section)?);
        return Ok(());
    }

    if section.is_summary {
        println!("\n▶ {}", section.name.to_uppercase());
    } else {
        println!("\n{}", section.name);
    }
    for row in &section.rows {
        println!("  {} {:<28} {}", signal_marker(row.signal), row.label, row.value);
    }
    Ok(())
}

fn render_event(event: &RankingEvent, market: Market, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        RankingEvent::Progress {
            current,
            total,
            symbol,
            status,
            reason,
        } => match (status, reason) {
            (MemberStatus::Skipped, Some(reason)) => {
                eprintln!("[{}/{}] {} skipped: {}", current, total, symbol, reason)
            }
            (MemberStatus::Skipped, None) => eprintln!("[{}/{}] {} skipped", current, total, symbol),
            (MemberStatus::Ok, _) => eprintln!("[{}/{}] {}", current, total, symbol),
        },
        RankingEvent::Result {
            rankings,
            from_cache,
        } => {
            if *from_cache {
                println!("\n(stored ranking for the current session)");
            }
            print_rankings(rankings, market);
        }
    }
    Ok(())
}

fn print_rankings(rankings: &[RankingEntry], market: Market) {
    if rankings.is_empty() {
        println!("No stock had enough data to rank.");
        return;
    }

    let currency = market.currency();
    println!(
        "\n{:>4}  {:<12} {:<24} {:>8} {:>8} {:>5} {:>5} {:>6} {:>14} {:>16} {:>8}",
        "Rank", "Symbol", "Name", "EY %", "ROIC %", "EY#", "ROIC#", "Score", "Price", "Market Cap", "P/E"
    );
    println!("{}", "─".repeat(128));

    for entry in rankings {
        let name: String = entry.name.chars().take(24).collect();
        println!(
            "{:>4}  {:<12} {:<24} {:>8.2} {:>8.2} {:>5} {:>5} {:>6} {:>14} {:>16} {:>8}",
            entry.rank,
            entry.symbol,
            name,
            entry.earnings_yield * 100.0,
            entry.roic * 100.0,
            entry.ey_rank,
            entry.roic_rank,
            entry.combined_rank,
            entry
                .price
                .map(|p| format::price(currency, p))
                .unwrap_or_else(|| format::NOT_AVAILABLE.to_string()),
            format::market_cap(currency, entry.market_cap),
            entry
                .pe_ratio
                .map(|pe| format!("{:.2}", pe))
                .unwrap_or_else(|| format::NOT_AVAILABLE.to_string()),
        );
    }
}
