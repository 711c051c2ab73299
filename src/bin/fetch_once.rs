//! Run a single fetch cycle across all stored search fields and print the
//! cycle report as JSON. Ctrl+C cancels the cycle without writing.
//!
//! Usage:
//!   cargo run --bin fetch_once

use dotenv::dotenv;
use log::{error, info, warn};
use nba_ws::{AppConfig, Service};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let service = Service::build(&config)?;
    info!("🔍 Fetching once ({} search fields)", service.db.list_specs()?.len());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupted, cancelling cycle");
            interrupt.cancel();
        }
    });

    let outcome = service.coordinator.run_cycle(&cancel).await;
    service.shutdown().await;

    match outcome {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            error!("❌ Fetch cycle failed: {}", e);
            Err(e.into())
        }
    }
}
