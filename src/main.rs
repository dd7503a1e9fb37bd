//! DEX Arbitrage Analytics - Main Entry Point
//!
//! Loads a pool snapshot, wires the repositories, oracle and detector together and
//! runs the periodic scan loop until Ctrl+C.

use anyhow::{Context, Result};
use dex_arb_analytics::{
    arbitrage::{ArbitrageDetector, ArbitrageScanner, CycleReport, DetectorSettings, OpportunityDeduplicator, ScannerSettings},
    errors::CircuitBreaker,
    liquidity::LiquidityAnalytics,
    pipeline::{self, BoxHandler, Pipeline, RetryConfig},
    pricing::{OracleSettings, PriceOracle},
    repository::{Cache, CachedPoolRepository, CachedTokenRepository, InMemoryStore, MemoryCache, PoolRepository, TokenRepository},
    storage::{EventSink, JsonlEventSink},
    utils::{self, SessionStats},
    *,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const STATS_EVERY_CYCLES: u64 = 20;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = CONFIG.clone();

    // Initialize logging
    utils::setup_output_directories(&config.output_dir)?;
    let _logging_guard = utils::setup_logging(&config.output_dir)?;

    info!("📈 DEX Arbitrage Analytics v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Chain ID: {}", config.chain_id);
    info!("   Scan Interval: {}s (timeout {}s)", config.scan_interval_secs, config.scan_timeout_secs);
    info!("   Min Profit: ${}", config.min_profit_usd);
    info!("   Large Opportunity: ${} at confidence >= {}", config.large_opportunity_usd, config.min_confidence);
    info!("   Gas Price: {} gwei", config.gas_price_gwei);
    info!("   Triangular: {} (base {})", config.enable_triangular, config.triangular_base_token);
    info!("   Snapshot: {}", config.snapshot_path.display());

    // Repositories: snapshot store behind a TTL cache
    let store = Arc::new(load_store(&config)?);
    let memory_cache = Arc::new(MemoryCache::new());
    let cache: Arc<dyn Cache> = memory_cache.clone();
    let pools: Arc<dyn PoolRepository> = Arc::new(CachedPoolRepository::new(
        store.clone(),
        cache.clone(),
        Duration::from_secs(config.pool_cache_ttl_secs),
    ));
    let tokens: Arc<dyn TokenRepository> = Arc::new(CachedTokenRepository::new(
        store.clone(),
        cache.clone(),
        Duration::from_secs(config.pool_cache_ttl_secs),
    ));

    // Analytics components
    let oracle = Arc::new(PriceOracle::new(
        tokens.clone(),
        pools.clone(),
        store.clone(),
        cache.clone(),
        OracleSettings {
            chain_id: config.chain_id,
            price_ttl: Duration::from_secs(config.price_cache_ttl_secs),
        },
    ));
    let detector = Arc::new(ArbitrageDetector::new(
        pools.clone(),
        tokens.clone(),
        oracle.clone(),
        cache.clone(),
        DetectorSettings::from_config(&config),
    ));
    let analytics = LiquidityAnalytics::new(pools.clone(), tokens.clone(), oracle.clone());

    log_startup_market(&oracle, &analytics, &config).await;

    let sink: Arc<dyn EventSink> = Arc::new(JsonlEventSink::new(config.events_dir()));
    let scanner = Arc::new(ArbitrageScanner::new(
        detector,
        OpportunityDeduplicator::new(config.max_cached_opportunity_hashes),
        sink,
        ScannerSettings::from_config(&config),
    ));

    // Setup shutdown handler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // dropping the sender would read as a shutdown
            std::future::pending::<()>().await;
        }
        info!("\n📛 Received shutdown signal (Ctrl+C)...");
        let _ = shutdown_tx.send(true);
    });

    let scan_cycle = build_scan_pipeline(scanner, shutdown_rx.clone(), &config);
    let circuit_breaker = CircuitBreaker::new(
        config.max_consecutive_errors,
        Duration::from_secs(config.circuit_breaker_cooldown_secs),
    );

    let start_time = Instant::now();
    let mut stats = SessionStats::new();
    let mut shutdown = shutdown_rx;
    let mut interval = time::interval(Duration::from_secs(config.scan_interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("\n🚀 Starting scan loop...\n");

    // Main scan loop; a cycle finishes before the next tick is awaited
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }

        if !circuit_breaker.can_proceed().await {
            warn!("⚡ Circuit breaker is OPEN, waiting for cooldown...");
            continue;
        }

        let outcome = tokio::select! {
            result = scan_cycle() => result,
            _ = shutdown.changed() => {
                info!("Abandoning in-flight scan cycle");
                break;
            }
        };

        match outcome {
            Ok(report) => {
                circuit_breaker.record_success().await;
                handle_report(&report, &mut stats);
            }
            Err(EngineError::Cancelled) => break,
            Err(e) => {
                error!(code = e.code(), "Scan cycle error: {}", e);
                stats.record_failure(e.code());
                if circuit_breaker.record_error().await {
                    error!("Circuit breaker activated due to scan errors");
                }

                tokio::select! {
                    _ = time::sleep(Duration::from_secs(config.scan_backoff_secs)) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }

        if stats.cycles > 0 && stats.cycles % STATS_EVERY_CYCLES == 0 {
            let purged = memory_cache.purge_expired().await;
            let remaining = memory_cache.len().await;
            debug!(purged, remaining, "Purged expired cache entries");
            utils::print_session_stats(start_time, &stats, &circuit_breaker).await;
        }
    }

    // Print final statistics
    info!("\n🛑 Shutting down gracefully...");
    info!("   Total runtime: {:?}", start_time.elapsed());
    utils::print_session_stats(start_time, &stats, &circuit_breaker).await;

    Ok(())
}

fn load_store(config: &Config) -> Result<InMemoryStore> {
    if !config.snapshot_path.exists() {
        warn!(
            "Snapshot {} not found, starting with an empty store",
            config.snapshot_path.display()
        );
        return Ok(InMemoryStore::new());
    }
    InMemoryStore::load_snapshot(&config.snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", config.snapshot_path.display()))
}

/// `isolate -> logging -> timeout -> retry -> cycle`: each cycle runs on its own task
/// so a panic counts as a failed cycle, and one deadline covers every retry.
fn build_scan_pipeline(
    scanner: Arc<ArbitrageScanner>,
    shutdown: watch::Receiver<bool>,
    config: &Config,
) -> BoxHandler<CycleReport> {
    let cycle = pipeline::handler(move || {
        let scanner = scanner.clone();
        let shutdown = shutdown.clone();
        async move { scanner.run_cycle(&shutdown).await }
    });

    Pipeline::new()
        .layer(pipeline::isolate("scan cycle"))
        .layer(pipeline::logging("scan cycle"))
        .layer(pipeline::timeout("scan cycle", Duration::from_secs(config.scan_timeout_secs)))
        .layer(pipeline::retry("scan cycle", RetryConfig::default()))
        .build(cycle)
}

fn handle_report(report: &CycleReport, stats: &mut SessionStats) {
    stats.record_cycle(report);
    utils::print_cycle_report(report);
    for opportunity in &report.published {
        utils::print_opportunity(opportunity);
    }
}

async fn log_startup_market(oracle: &PriceOracle, analytics: &LiquidityAnalytics, config: &Config) {
    match oracle.eth_usd_price().await {
        Ok(price) => info!("💹 ETH/USD: ${:.2}", price),
        Err(e) => warn!("ETH/USD unavailable at startup: {} (gas falls back to flat estimate)", e),
    }

    match analytics.liquidity_concentration(config.triangular_base_token).await {
        Ok(concentration) => info!(
            "🏊 Base token liquidity: {} pools, HHI {:.4} ({})",
            concentration.pool_count, concentration.hhi, concentration.concentration
        ),
        Err(e) => warn!("Base token liquidity unavailable: {}", e),
    }
}
