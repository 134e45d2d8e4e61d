//! Main entry point for the openphone-data-downloader CLI

use clap::Parser;
use openphone_data_downloader::cli::{Cli, Commands};
use openphone_data_downloader::metrics::init_metrics;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("openphone_data_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Extract(args) => {
            args.execute(cli).await?;
        }
        Commands::Webhook(args) => {
            args.execute(cli).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // .env is optional
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = init_metrics(addr) {
            warn!("{}", e);
        }
    }

    let result = tokio::select! {
        result = run(&cli) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl+C received, aborting without writing output");
            std::process::exit(130);
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
