//! Batch resolution pipeline.
//!
//! Runs postal code → coordinate → nearest station → archive → daily mean →
//! degree days for every requested postal code. Failures are captured per
//! item: one bad postal code never aborts the batch, and the caller always
//! gets exactly one row per requested code.

use chrono::{Local, NaiveDate};
use reqwest::Client;

use crate::archive::{ArchiveResolver, Tier};
use crate::cache::CacheStore;
use crate::dwd::DwdEndpoints;
use crate::error::PipelineError;
use crate::geocode::{Geocoder, NOMINATIM_URL};
use crate::hdd::heating_degree_days;
use crate::model::Coordinate;
use crate::reading::{DailyTable, DEFAULT_FALLBACK_DAYS};
use crate::station::locate::nearest_station;
use crate::station::{Station, StationCatalog};

/// One output record per requested postal code.
#[derive(Debug, Clone)]
pub struct ResolutionRow {
    pub postal_code: String,
    pub coordinate: Option<Coordinate>,
    pub place: Option<String>,
    pub station_id: Option<u32>,
    pub station_name: Option<String>,
    pub distance_km: Option<f64>,
    pub tier: Option<Tier>,
    pub date_used: Option<NaiveDate>,
    pub tmean: Option<f64>,
    pub tbase: f64,
    pub hdd: Option<f64>,
    pub ok: bool,
    pub status: String,
}

impl ResolutionRow {
    fn new(postal_code: &str, tbase: f64) -> Self {
        Self {
            postal_code: postal_code.to_string(),
            coordinate: None,
            place: None,
            station_id: None,
            station_name: None,
            distance_km: None,
            tier: None,
            date_used: None,
            tmean: None,
            tbase,
            hdd: None,
            ok: false,
            status: String::new(),
        }
    }

    fn fail(mut self, error: &PipelineError) -> Self {
        self.ok = false;
        self.status = error.to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub endpoints: DwdEndpoints,
    pub nominatim_url: String,
    pub fallback_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoints: DwdEndpoints::default(),
            nominatim_url: NOMINATIM_URL.to_string(),
            fallback_days: DEFAULT_FALLBACK_DAYS,
        }
    }
}

pub struct Pipeline {
    geocoder: Geocoder,
    catalog: StationCatalog,
    resolver: ArchiveResolver,
    fallback_days: u32,
}

impl Pipeline {
    pub fn new(client: Client, cache: CacheStore, config: PipelineConfig) -> Self {
        Self {
            geocoder: Geocoder::with_base_url(
                client.clone(),
                cache.clone(),
                &config.nominatim_url,
            ),
            catalog: StationCatalog::new(client.clone(), cache.clone(), config.endpoints.clone()),
            resolver: ArchiveResolver::new(client, cache, config.endpoints),
            fallback_days: config.fallback_days,
        }
    }

    /// Resolves a batch. `date` and `base_temperature` arrive as user input
    /// and are validated once, up front; a batch-level validation failure is
    /// reported uniformly on every row without any network traffic.
    pub async fn run(&self, postal_codes: &[String], date: &str, base_temperature: &str) -> Vec<ResolutionRow> {
        let codes = normalize_codes(postal_codes);

        let parsed_date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d");
        let parsed_base: std::result::Result<f64, _> =
            base_temperature.trim().replace(',', ".").parse();

        let (date, tbase) = match (parsed_date, parsed_base) {
            (Ok(date), Ok(tbase)) => (date, tbase),
            (Err(_), base) => {
                let error = PipelineError::InvalidInput(format!("date `{date}` (expected YYYY-MM-DD)"));
                return uniform_failure(&codes, base.unwrap_or(0.0), &error);
            }
            (_, Err(_)) => {
                let error = PipelineError::InvalidInput(format!(
                    "base temperature `{base_temperature}` is not a number"
                ));
                return uniform_failure(&codes, 0.0, &error);
            }
        };

        if date > Local::now().date_naive() {
            return uniform_failure(&codes, tbase, &PipelineError::FutureDate(date));
        }

        // The catalog is loaded once per batch; a load failure is reported on
        // every row rather than aborting the response.
        let catalog = self.catalog.load().await;

        let mut rows = Vec::with_capacity(codes.len());
        for code in &codes {
            let row = match &catalog {
                Ok(stations) => self.resolve_one(stations, code, date, tbase).await,
                Err(error) => ResolutionRow::new(code, tbase).fail(error),
            };
            rows.push(row);
        }

        rows
    }

    async fn resolve_one(
        &self,
        stations: &[Station],
        postal_code: &str,
        date: NaiveDate,
        tbase: f64,
    ) -> ResolutionRow {
        let mut row = ResolutionRow::new(postal_code, tbase);

        if postal_code.is_empty() {
            return row.fail(&PipelineError::InvalidInput("empty postal code".to_string()));
        }

        let place = match self.geocoder.lookup(postal_code).await {
            Ok(place) => place,
            Err(error) => return row.fail(&error),
        };
        row.coordinate = Some(place.coordinate);
        row.place = Some(place.label);

        let nearest = match nearest_station(stations, place.coordinate, Some(date)) {
            Ok(nearest) => nearest,
            Err(error) => return row.fail(&error),
        };
        row.station_id = Some(nearest.station.id);
        row.station_name = Some(nearest.station.name.clone());
        row.distance_km = Some(nearest.distance_km);

        let archive = match self.resolver.fetch(nearest.station.id).await {
            Ok(archive) => archive,
            Err(error) => return row.fail(&error),
        };
        row.tier = Some(archive.tier);

        let table = match DailyTable::from_archive(&archive.data) {
            Ok(table) => table,
            Err(error) => return row.fail(&error),
        };

        let extraction = match table.extract(date, self.fallback_days) {
            Ok(extraction) => extraction,
            Err(error) => return row.fail(&error),
        };
        row.date_used = Some(extraction.date_used);
        row.tmean = Some(extraction.tmean);
        row.hdd = Some(heating_degree_days(tbase, extraction.tmean));
        row.ok = true;
        row.status = "ok".to_string();

        row
    }
}

/// Digit-normalizes postal codes and deduplicates them, preserving order.
fn normalize_codes(postal_codes: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for code in postal_codes {
        let normalized: String = code.chars().filter(char::is_ascii_digit).collect();
        if !seen.contains(&normalized) {
            seen.push(normalized);
        }
    }
    seen
}

fn uniform_failure(codes: &[String], tbase: f64, error: &PipelineError) -> Vec<ResolutionRow> {
    codes
        .iter()
        .map(|code| ResolutionRow::new(code, tbase).fail(error))
        .collect()
}

// -- Tests -------------------------------------------------------------------
