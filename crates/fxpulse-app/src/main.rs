//! fxpulse - market-data ingestion, caching and alerting pipeline.

use anyhow::Result;
use clap::Parser;
use fxpulse_app::{AppConfig, Pipeline};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fetch rates and news, keep history and raise threshold alerts.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FXPULSE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single refresh tick and print the snapshot as JSON
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    fxpulse_telemetry::init_logging()?;
    info!("Starting fxpulse v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref())?;
    info!(market = %config.market, interval_secs = config.refresh_interval_secs, "Configuration loaded");

    let pipeline = Pipeline::new(config)?;

    if args.once {
        let report = pipeline.tick().await;
        info!(bases = report.rates.len(), alerts = report.alerts(), "Single tick complete");
        println!("{}", serde_json::to_string_pretty(&pipeline.snapshot())?);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal_token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    pipeline.run(shutdown).await?;

    match fxpulse_telemetry::Metrics::gather_text() {
        Ok(text) => info!(bytes = text.len(), "Final metrics gathered"),
        Err(e) => warn!(error = %e, "Failed to gather metrics"),
    }
    info!("Shutting down");
    Ok(())
}
