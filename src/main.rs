//! Cycle Arbitrage Bot - Main Entry Point
//!
//! Multi-venue DEX arbitrage: cycle search, strategy signals, risk gate and
//! transaction execution on a fixed polling interval.

use cycle_arb_bot::*;
use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

use crate::arbitrage::DetectionConfig;
use crate::bot::{KillSwitch, Pipeline, PreflightSettings, run_preflight_checks};
use crate::config::{RiskConfig, RiskConfigManager};
use crate::events::EventBus;
use crate::execution::{ExecutionConfig, ExecutionEngine, LendingReserve, TransactionBuilder, TransactionSigner};
use crate::network::{BundleRelay, HttpBundleRelay, JsonRpcClient, RetryConfig, TransactionRpc, rate_limiter};
use crate::risk::RiskGate;
use crate::storage::{AUDIT_DIR, TRADES_DIR, spawn_audit_sink};
use crate::strategies::{StrategyConfig, StrategyRegistry};
use crate::venues::{HttpVenueGateway, VenueGateway};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    let _logging_guard = utils::setup_logging()?;
    utils::setup_output_directories()?;

    // Load configuration
    let config = CONFIG.clone();

    info!("🔁 Cycle Arbitrage Bot v0.1.0");
    info!("📋 Configuration:");
    info!("   Quote token: {}", config.quote_token);
    info!("   Venues: {}", config.venues.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "));
    info!("   Pairs: {}", config.trading_pairs.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", "));
    info!("   Poll interval: {}ms (search budget {}ms)", config.poll_interval_ms, config.search_budget_ms());
    info!("   Max hops: {}", config.max_hops);
    info!("   Min profit: {}%", config.min_profit_pct);
    info!("   Statistical strategy: {}", config.enable_statistical);
    info!("   Latency strategy: {}", config.enable_latency);
    info!("   Flash loans: {:?}", config.flash_loan_policy);
    info!("   Private relay: {}", config.use_private_relay);
    if config.dry_run {
        info!("   ⚠️  DRY RUN MODE - transactions are simulated, never submitted");
    } else {
        warn!("   🔥 LIVE MODE - signed transactions will be submitted");
    }

    if config.trading_pairs.is_empty() || config.venues.is_empty() {
        return Err(anyhow::anyhow!("At least one venue and one trading pair are required"));
    }

    // Risk snapshot
    let risk_config = match &config.risk_config_path {
        Some(path) => RiskConfigManager::load(path)?,
        None => RiskConfigManager::in_memory(RiskConfig::from_config(&config))?,
    };

    // Network clients
    let request_timeout = Duration::from_millis(config.request_timeout_ms);
    let retry = RetryConfig::new(config.max_retry_attempts, config.retry_base_delay_ms);
    let gateway: Arc<dyn VenueGateway> = Arc::new(HttpVenueGateway::new(
        &config.quote_api_url,
        config.venue_rate_limit_per_sec,
        request_timeout,
        retry,
    )?);
    let rpc_limiter = rate_limiter::per_second(config.rpc_rate_limit_per_sec);
    let rpc: Arc<dyn TransactionRpc> = Arc::new(JsonRpcClient::new(&config.rpc_url, rpc_limiter, request_timeout));
    let relay: Option<Arc<dyn BundleRelay>> = if config.use_private_relay {
        let relay_limiter = rate_limiter::per_second(config.rpc_rate_limit_per_sec);
        Some(Arc::new(HttpBundleRelay::new(&config.relay_url, relay_limiter, request_timeout)?))
    } else {
        None
    };

    // Signing key
    let signer = match &config.private_key {
        Some(key) => TransactionSigner::from_private_key(key)?,
        None if config.dry_run => {
            warn!("No PRIVATE_KEY set, signing dry-run transactions with an ephemeral key");
            TransactionSigner::ephemeral()
        }
        None => return Err(anyhow::anyhow!("PRIVATE_KEY is required when DRY_RUN=false")),
    };
    info!("🔑 Payer: {}", signer.pubkey());

    // Pre-flight checks
    let kill = KillSwitch::new(config.kill_switch_file.as_ref().map(PathBuf::from));
    run_preflight_checks(rpc.as_ref(), &PreflightSettings::from_config(&config), &kill).await?;

    // Pipeline components
    let events = EventBus::default();
    let audit_sink = spawn_audit_sink(&events, PathBuf::from(AUDIT_DIR));
    let gate = Arc::new(RiskGate::new(risk_config.current().clone(), events.clone(), Utc::now()));
    let builder = TransactionBuilder::new(
        signer.pubkey(),
        None,
        LendingReserve::default(),
        config.quote_token_decimals,
    );
    let engine = Arc::new(ExecutionEngine::new(
        gateway.clone(),
        rpc,
        relay,
        builder,
        signer,
        ExecutionConfig::from_config(&config),
        events.clone(),
    ));
    let strategies = StrategyRegistry::from_config(&StrategyConfig::from_config(&config));
    info!("🧠 Strategies: {}", strategies.names().join(", "));

    let mut pipeline = Pipeline::new(
        gateway,
        config.venues.clone(),
        config.trading_pairs.clone(),
        DetectionConfig::from_config(&config),
        Duration::from_millis(config.search_budget_ms()),
        strategies,
        gate,
        engine,
        risk_config,
        events.clone(),
    )
    .with_trade_log(PathBuf::from(TRADES_DIR));

    // Setup shutdown handler
    let signal_kill = kill.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("\n📛 Received shutdown signal (Ctrl+C)...");
                signal_kill.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });
    let mut kill_rx = kill.subscribe();

    info!("\n🚀 Starting main detection loop...\n");

    let mut interval = time::interval(Duration::from_millis(config.poll_interval_ms));
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    // Main detection loop
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(source) = kill.poll() {
                    info!(source, "Kill switch engaged, shutting down");
                    pipeline.shutdown(source).await;
                    break;
                }

                let report = pipeline.tick(Utc::now()).await;
                if report.tick % config.stats_interval_ticks == 0 {
                    let risk = pipeline.gate().snapshot(Utc::now()).await;
                    utils::print_session_stats(pipeline.stats(), &risk);
                }
            }
            _ = kill_rx.changed() => {
                info!("Kill signal received, shutting down");
                pipeline.shutdown("signal").await;
                break;
            }
        }
    }

    // Print final statistics
    let risk = pipeline.gate().snapshot(Utc::now()).await;
    utils::print_session_stats(pipeline.stats(), &risk);

    drop(pipeline);
    drop(events);
    if let Err(e) = audit_sink.await {
        error!("Audit sink ended abnormally: {}", e);
    }

    info!("👋 Shutdown complete");
    Ok(())
}
