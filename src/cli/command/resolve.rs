//! The `resolve` command: postal codes in, degree-day rows out.

use std::path::Path;

use anyhow::Result;
use reqwest::Client;

use crate::cache::CacheStore;
use crate::cli::create_spinner;
use crate::pipeline::{Pipeline, PipelineConfig, ResolutionRow};

use super::make_csv_file_name;

const USER_AGENT: &str = concat!("hdd-resolver/", env!("CARGO_PKG_VERSION"));

pub async fn resolve(
    cache_path: &Path,
    postal_codes: &[String],
    date: &str,
    base: &str,
    fallback_days: u32,
    csv: bool,
) -> Result<()> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()?;
    let cache = CacheStore::open(cache_path).await?;

    let config = PipelineConfig {
        fallback_days,
        ..Default::default()
    };
    let pipeline = Pipeline::new(client, cache, config);

    let bar = create_spinner("Resolving postal codes...".to_string());
    let rows = pipeline.run(postal_codes, date, base).await;
    bar.finish_and_clear();

    for row in &rows {
        println!("{}", format_row(row));
    }

    if csv {
        let file_name = make_csv_file_name(date.trim());
        std::fs::write(&file_name, render_csv(&rows))?;
        println!("Export saved to `{}`", file_name.display());
    }

    Ok(())
}

fn format_row(row: &ResolutionRow) -> String {
    if !row.ok {
        return format!("{:<6} FAILED  {}", row.postal_code, row.status);
    }

    format!(
        "{:<6} {:<25} station {:05} {} ({:.1} km, {})  {}  tmean {:.1} °C  hdd {:.2}",
        row.postal_code,
        row.place.as_deref().unwrap_or(""),
        row.station_id.unwrap_or(0),
        row.station_name.as_deref().unwrap_or(""),
        row.distance_km.unwrap_or(0.0),
        row.tier.map(|tier| tier.as_str()).unwrap_or(""),
        row.date_used.map(|d| d.to_string()).unwrap_or_default(),
        row.tmean.unwrap_or(0.0),
        row.hdd.unwrap_or(0.0),
    )
}

/// Renders rows as a semicolon-separated table, one line per postal code.
pub fn render_csv(rows: &[ResolutionRow]) -> String {
    let mut out = String::from(
        "postal_code;place;latitude;longitude;station_id;station_name;distance_km;tier;date_used;tmean;tbase;hdd;ok;status\n",
    );

    for row in rows {
        let fields = [
            row.postal_code.clone(),
            row.place.clone().unwrap_or_default(),
            row.coordinate
                .map(|c| format!("{:.4}", c.latitude))
                .unwrap_or_default(),
            row.coordinate
                .map(|c| format!("{:.4}", c.longitude))
                .unwrap_or_default(),
            row.station_id.map(|id| id.to_string()).unwrap_or_default(),
            row.station_name.clone().unwrap_or_default(),
            row.distance_km
                .map(|d| format!("{d:.1}"))
                .unwrap_or_default(),
            row.tier
                .map(|tier| tier.as_str().to_string())
                .unwrap_or_default(),
            row.date_used.map(|d| d.to_string()).unwrap_or_default(),
            row.tmean.map(|t| format!("{t:.1}")).unwrap_or_default(),
            format!("{:.1}", row.tbase),
            row.hdd.map(|h| format!("{h:.2}")).unwrap_or_default(),
            row.ok.to_string(),
            row.status.clone(),
        ];

        let line: Vec<String> = fields
            .iter()
            // The delimiter must not appear inside a field.
            .map(|field| field.replace(';', ","))
            .collect();
        out.push_str(&line.join(";"));
        out.push('\n');
    }

    out
}

// -- Tests -------------------------------------------------------------------
