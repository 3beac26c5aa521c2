//! MAG Processor - reward settlement service
//!
//! Serves the transaction / balance-check endpoints, settles the lottery
//! window on a timer, and returns liquidity stakes once their hold elapses.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mag_processor::{
    api::{create_router, AppState},
    chain::{
        CommandExecutor, DryRunExecutor, HttpCommandExecutor, HttpTransactionSource,
        TransactionSource,
    },
    clock::SystemClock,
    config::ServiceConfig,
    models::format_units,
    stake::spawn_release_loop,
    RewardEngine,
};

#[derive(Parser, Debug)]
#[command(name = "mag-processor")]
#[command(about = "Reward settlement service for the MAG incentive program")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "MAG_PROCESSOR_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log filter, e.g. "info" or "mag_processor=trace"
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    let engine_config = Arc::new(config.engine.clone());
    info!(
        window_ms = engine_config.window_millis(),
        hold_ms = engine_config.liquidity_hold_millis(),
        entry_stake = %format_units(engine_config.lottery_entry_stake),
        auto_buy_threshold = %format_units(engine_config.auto_buy_threshold),
        "🚀 MAG processor starting"
    );

    let engine = Arc::new(RewardEngine::new(engine_config, Arc::new(SystemClock))?);
    info!(
        top_prize = %format_units(engine.calculator().table().top_prize()),
        "reward table ready"
    );

    let chain_api_url = config
        .chain_api_url
        .as_deref()
        .context("CHAIN_API_URL (or chain_api_url in the config file) is required")?;
    let source: Arc<dyn TransactionSource> =
        Arc::new(HttpTransactionSource::new(chain_api_url, config.http_timeout)?);

    let executor: Arc<dyn CommandExecutor> = match config.executor_url.as_deref() {
        Some(url) => {
            info!(%url, "commands will be handed to the executor service");
            Arc::new(HttpCommandExecutor::new(url, config.http_timeout)?)
        }
        None => {
            warn!("EXECUTOR_URL not set, running in dry-run mode");
            Arc::new(DryRunExecutor)
        }
    };

    let mut scheduler = engine.settlement_scheduler(executor.clone());
    scheduler.start();

    let release_task = spawn_release_loop(
        engine.ledger(),
        engine.clock(),
        executor.clone(),
        engine.factory().clone(),
        config.release_poll,
    );

    let app = create_router(AppState {
        engine,
        source,
        executor,
        balance_check_delay: config.balance_check_delay,
    });

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🎯 API server listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // an in-flight settlement round finishes paying out before exit
    scheduler.shutdown().await;
    release_task.abort();
    info!("MAG processor stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn load_env() {
    // Standard dotenv search (cwd + parents), then the crate root
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "mag_processor=debug,tower_http=debug".into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
