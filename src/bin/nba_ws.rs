//! Service runtime: applies migrations, runs the periodic fetch cycle and
//! revokes the bearer token on shutdown.
//!
//! Usage:
//!   cargo run --release --bin nba_ws
//!
//! Environment variables: see `AppConfig::from_env`.
//!
//! The REST dispatcher (`nba_ws::api::Api`) is not served by this binary; an
//! HTTP adapter mounts it.

use dotenv::dotenv;
use log::{error, info};
use nba_ws::{AppConfig, Service};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 NBA tweet search service");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            return Err(e.into());
        }
    };

    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Twitter API: {}", config.api_url);
    info!("   ├─ API base URI: {}", config.api_base_uri);
    info!("   ├─ Fetch interval: {}s", config.fetch_interval.as_secs());
    info!("   ├─ Concurrency: {}", config.fetch_concurrency);
    info!("   └─ Request budget: {} per cycle", config.request_budget);

    let service = Service::build(&config)?;
    info!("✅ Service initialized");

    let shutdown = CancellationToken::new();
    let scheduler = if config.scheduler_enabled {
        Some(service.spawn_scheduler(&config, shutdown.clone()))
    } else {
        info!("⚠️  Scheduler is DISABLED (set ENABLE_SCHEDULER=true to activate)");
        None
    };

    info!("✅ Running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("🛑 Shutdown signal received");
    shutdown.cancel();
    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.await {
            error!("❌ Scheduler task failed: {}", e);
        }
    }

    service.shutdown().await;
    info!("✅ Shutdown complete");
    Ok(())
}
