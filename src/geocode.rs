//! Postal code geocoding via Nominatim (OpenStreetMap).
//!
//! Results are cached for 30 days; a cache hit makes no network call.

use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::cache::CacheStore;
use crate::error::{PipelineError, Result};
use crate::model::{Coordinate, PlaceLookup};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
const PLACE_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

pub struct Geocoder {
    client: Client,
    cache: CacheStore,
    base_url: String,
}

impl Geocoder {
    pub fn new(client: Client, cache: CacheStore) -> Self {
        Self::with_base_url(client, cache, NOMINATIM_URL)
    }

    pub fn with_base_url(client: Client, cache: CacheStore, base_url: &str) -> Self {
        Self {
            client,
            cache,
            base_url: base_url.to_string(),
        }
    }

    /// Resolves a postal code to a coordinate and place label.
    ///
    /// Tries a structured postal-code query restricted to Germany first, then
    /// a free-text query. Fails with `GeocodeNotFound` when both come back
    /// empty.
    pub async fn lookup(&self, postal_code: &str) -> Result<PlaceLookup> {
        if let Some(cached) = self.cache.get_place(postal_code).await? {
            if Utc::now() - cached.fetched_at < Duration::days(PLACE_MAX_AGE_DAYS) {
                tracing::debug!(postal_code, "geocode cache hit");
                return Ok(cached);
            }
        }

        let mut results = self
            .query(&[
                ("countrycodes", "de"),
                ("postalcode", postal_code),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .await?;

        if results.is_empty() {
            let free_text = format!("{postal_code} Deutschland");
            results = self
                .query(&[
                    ("q", free_text.as_str()),
                    ("format", "jsonv2"),
                    ("addressdetails", "1"),
                    ("limit", "1"),
                ])
                .await?;
        }

        let hit = results
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::GeocodeNotFound(postal_code.to_string()))?;

        let coordinate = parse_coordinate(&hit)
            .ok_or_else(|| PipelineError::GeocodeNotFound(postal_code.to_string()))?;

        let place = PlaceLookup {
            postal_code: postal_code.to_string(),
            coordinate,
            label: place_label(&hit),
            fetched_at: Utc::now(),
        };

        // A failed cache write must not fail the lookup itself.
        if let Err(e) = self.cache.put_place(&place).await {
            tracing::warn!(postal_code, error = %e, "failed to cache geocode result");
        }

        Ok(place)
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Vec<NominatimResult>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .timeout(std::time::Duration::from_secs(20))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

fn parse_coordinate(hit: &NominatimResult) -> Option<Coordinate> {
    let coordinate = Coordinate::new(hit.lat.parse().ok()?, hit.lon.parse().ok()?);
    coordinate.is_valid().then_some(coordinate)
}

/// Prefer city > town > village > county, with the state appended; fall back
/// to the provider's display string.
fn place_label(hit: &NominatimResult) -> String {
    let place = hit.address.as_ref().and_then(|addr| {
        addr.city
            .as_ref()
            .or(addr.town.as_ref())
            .or(addr.village.as_ref())
            .or(addr.county.as_ref())
            .cloned()
    });

    match place {
        Some(place) => {
            let state = hit
                .address
                .as_ref()
                .and_then(|addr| addr.state.as_ref())
                .filter(|state| !state.is_empty() && state.as_str() != place);
            match state {
                Some(state) => format!("{place}, {state}"),
                None => place,
            }
        }
        None => hit.display_name.clone().unwrap_or_default(),
    }
}

// -- Tests -------------------------------------------------------------------
