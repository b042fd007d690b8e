mod archive;
mod cache;
mod cli;
mod dwd;
mod error;
mod geocode;
mod hdd;
mod model;
mod pipeline;
mod reading;
mod station;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cache_path = cli.cache_path();

    match &cli.command {
        Commands::Resolve {
            plz,
            date,
            base,
            fallback_days,
            csv,
        } => {
            if let Err(e) = command::resolve(&cache_path, plz, date, base, *fallback_days, *csv).await
            {
                eprintln!("Error: {e}");
            }
        }
        Commands::Stations { refresh } => {
            if let Err(e) = command::stations(&cache_path, *refresh).await {
                eprintln!("Error: {e}");
            }
        }
    }

    Ok(())
}
