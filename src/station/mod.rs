//! DWD station catalog.
//!
//! The station list is a fixed-width text table ("KL_Tageswerte_Beschreibung_
//! Stationen.txt"): id, validity start/end, altitude, latitude, longitude,
//! name, federal state. Parsed snapshots are cached as tab-separated lines so
//! reloads skip the upstream format entirely.

pub mod locate;

use chrono::{Duration, NaiveDate};
use reqwest::Client;

use crate::cache::CacheStore;
use crate::dwd::DwdEndpoints;
use crate::error::{PipelineError, Result};
use crate::model::Coordinate;

pub const CATALOG_CACHE_KEY: &str = "station_catalog";
const CATALOG_MAX_AGE_HOURS: i64 = 24;

// Fixed column ranges of the upstream station list, in characters.
const ID: (usize, usize) = (0, 5);
const VALID_FROM: (usize, usize) = (6, 14);
const VALID_TO: (usize, usize) = (15, 23);
const LATITUDE: (usize, usize) = (38, 50);
const LONGITUDE: (usize, usize) = (50, 60);
const NAME: (usize, usize) = (61, 102);

#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: u32,
    pub coordinate: Coordinate,
    pub name: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl Station {
    pub fn from_line(line: &str) -> Result<Self> {
        // Station names carry umlauts, so slice on characters, not bytes.
        let chars: Vec<char> = line.chars().collect();

        let id_raw = field(&chars, ID);
        let id: u32 = id_raw
            .parse()
            .map_err(|_| PipelineError::InvalidInput(format!("station id `{id_raw}`")))?;
        if id == 0 {
            return Err(PipelineError::InvalidInput("station id 0".to_string()));
        }

        let latitude: f64 = parse_float(&field(&chars, LATITUDE))?;
        let longitude: f64 = parse_float(&field(&chars, LONGITUDE))?;
        let coordinate = Coordinate::new(latitude, longitude);
        if !coordinate.is_valid() {
            return Err(PipelineError::InvalidInput(format!(
                "coordinate out of range for station {id}"
            )));
        }

        Ok(Station {
            id,
            coordinate,
            name: field(&chars, NAME),
            valid_from: parse_window_date(&field(&chars, VALID_FROM)),
            valid_to: parse_window_date(&field(&chars, VALID_TO)),
        })
    }

    /// Whether the station's validity window contains `date`; absent bounds
    /// are open.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from.map_or(true, |from| date >= from)
            && self.valid_to.map_or(true, |to| date <= to)
    }
}

fn field(chars: &[char], (start, end): (usize, usize)) -> String {
    let start = start.min(chars.len());
    let end = end.min(chars.len());
    chars[start..end].iter().collect::<String>().trim().to_string()
}

fn parse_float(s: &str) -> Result<f64> {
    s.parse()
        .map_err(|_| PipelineError::InvalidInput(format!("float `{s}`")))
}

/// Absent or all-zero window dates mean an unbounded window.
fn parse_window_date(s: &str) -> Option<NaiveDate> {
    if s.is_empty() || s.chars().all(|c| c == '0') {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

/// Parses the upstream fixed-width list, skipping the header and any row that
/// does not parse (separator dashes, malformed floats).
pub fn parse_station_list(text: &str) -> Vec<Station> {
    text.lines()
        .filter_map(|line| match Station::from_line(line) {
            Ok(station) => Some(station),
            Err(e) => {
                tracing::trace!(error = %e, "skipping station list row");
                None
            }
        })
        .collect()
}

/// Serializes a parsed catalog into the tab-separated snapshot format.
pub fn serialize_snapshot(stations: &[Station]) -> String {
    let mut out = String::new();
    for station in stations {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            station.id,
            station.valid_from.map(format_window_date).unwrap_or_default(),
            station.valid_to.map(format_window_date).unwrap_or_default(),
            station.coordinate.latitude,
            station.coordinate.longitude,
            station.name,
        ));
    }
    out
}

fn format_window_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn parse_snapshot(text: &str) -> Vec<Station> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 6 {
                return None;
            }
            Some(Station {
                id: fields[0].parse().ok()?,
                valid_from: parse_window_date(fields[1]),
                valid_to: parse_window_date(fields[2]),
                coordinate: Coordinate::new(fields[3].parse().ok()?, fields[4].parse().ok()?),
                name: fields[5].to_string(),
            })
        })
        .collect()
}

pub struct StationCatalog {
    client: Client,
    cache: CacheStore,
    endpoints: DwdEndpoints,
}

impl StationCatalog {
    pub fn new(client: Client, cache: CacheStore, endpoints: DwdEndpoints) -> Self {
        Self {
            client,
            cache,
            endpoints,
        }
    }

    /// Returns the station catalog, from the cached snapshot when it is fresh
    /// and non-empty, otherwise from upstream.
    pub async fn load(&self) -> Result<Vec<Station>> {
        if let Some(blob) = self.cache.get_blob(CATALOG_CACHE_KEY).await? {
            if blob.is_fresh(Duration::hours(CATALOG_MAX_AGE_HOURS)) {
                let stations = parse_snapshot(&String::from_utf8_lossy(&blob.data));
                if !stations.is_empty() {
                    tracing::debug!(count = stations.len(), "station catalog cache hit");
                    return Ok(stations);
                }
                // An empty snapshot is as good as a miss.
            }
        }

        self.refresh().await
    }

    /// Fetches and parses the upstream list, preferring the recent endpoint
    /// and falling back to the historical copy, then refreshes the snapshot.
    pub async fn refresh(&self) -> Result<Vec<Station>> {
        let text = match self.fetch(&self.endpoints.recent_station_list()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "recent station list unavailable, trying historical");
                self.fetch(&self.endpoints.historical_station_list()).await?
            }
        };

        let stations = parse_station_list(&text);
        if stations.is_empty() {
            return Err(PipelineError::NoStations);
        }

        if let Err(e) = self
            .cache
            .put_blob(CATALOG_CACHE_KEY, serialize_snapshot(&stations).as_bytes())
            .await
        {
            tracing::warn!(error = %e, "failed to cache station catalog snapshot");
        }

        Ok(stations)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(20))
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// -- Tests -------------------------------------------------------------------
