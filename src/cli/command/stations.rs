//! The `stations` command: load the catalog and print a summary.

use std::path::Path;

use anyhow::Result;
use reqwest::Client;

use crate::cache::CacheStore;
use crate::cli::create_spinner;
use crate::dwd::DwdEndpoints;
use crate::station::StationCatalog;

pub async fn stations(cache_path: &Path, refresh: bool) -> Result<()> {
    let client = Client::builder()
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()?;
    let cache = CacheStore::open(cache_path).await?;
    let catalog = StationCatalog::new(client, cache, DwdEndpoints::default());

    let bar = create_spinner("Loading station catalog...".to_string());
    let stations = if refresh {
        catalog.refresh().await?
    } else {
        catalog.load().await?
    };
    bar.finish_and_clear();

    println!("{} stations in catalog", stations.len());
    for station in stations.iter().take(10) {
        println!(
            "  {:05}  {:<40} {:>8.4} {:>9.4}",
            station.id,
            station.name,
            station.coordinate.latitude,
            station.coordinate.longitude
        );
    }
    if stations.len() > 10 {
        println!("  ...");
    }

    Ok(())
}
