//! Attendance webhook - beacon check-in bot for the office LINE channel
//!
//! Receives signed webhook batches from the messaging platform, appends
//! arrival/departure records to the attendance log, and forwards templated
//! status lines to the team Slack channel.
//!
//! Module structure:
//! - `domain/` - Core business types (records, events, reply tokens)
//! - `io/` - External interfaces (HTTP server, LINE, Slack, store)
//! - `services/` - Business logic (attendance decision engine)
//! - `infra/` - Infrastructure (Config, errors, metrics)

use anyhow::Context;
use clap::Parser;
use kintai_webhook::infra::{Config, Metrics};
use kintai_webhook::io::{start_server, JsonlStore, LineClient, ServerContext, SlackNotifier};
use kintai_webhook::services::AttendanceService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Attendance webhook - beacon check-in bot
#[derive(Parser, Debug)]
#[command(name = "kintai-webhook", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

const METRICS_LOG_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("kintai-webhook starting");

    // Parse command line arguments using clap
    let args = Args::parse();

    // Config file: --config, then CONFIG_FILE env, then the dev default
    let config_path = args
        .config
        .or_else(|| std::env::var("CONFIG_FILE").ok())
        .unwrap_or_else(|| "config/dev.toml".to_string());

    let config = Config::load_from_path(&config_path);
    config.validate().context("configuration is incomplete")?;

    // Log configuration (credentials stay out of the log)
    info!(
        config_file = %config.config_file(),
        bind_address = %config.bind_address(),
        port = %config.port(),
        store_file = %config.store_file(),
        utc_offset_hours = %config.utc_offset_hours(),
        line_api_base = %config.line_api_base(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create shared components
    let metrics = Arc::new(Metrics::new());
    let store = Arc::new(JsonlStore::new(config.store_file()));
    let notifier = Arc::new(SlackNotifier::new(&config));
    let line = Arc::new(LineClient::new(&config));

    let ctx = Arc::new(ServerContext {
        service: AttendanceService::new(store, notifier, metrics.clone()),
        line: line.clone(),
        replier: line,
        metrics: metrics.clone(),
        tz: config.tz(),
    });

    // Periodic metrics summary in the log
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(METRICS_LOG_INTERVAL_SECS));
        interval.tick().await; // first tick is immediate, skip it
        loop {
            interval.tick().await;
            metrics.snapshot().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let addr: SocketAddr = format!("{}:{}", config.bind_address(), config.port())
        .parse()
        .context("invalid bind address")?;

    start_server(addr, ctx, shutdown_rx)
        .await
        .map_err(|e| anyhow::anyhow!("webhook server error: {e}"))?;

    info!("kintai-webhook shutdown complete");
    Ok(())
}
