//! Nearest-station search.

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::model::Coordinate;
use crate::station::Station;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Result of a nearest-station search.
#[derive(Debug, Clone)]
pub struct NearestStation {
    pub station: Station,
    pub distance_km: f64,
    /// False when the date restriction emptied the candidate set and the
    /// search fell back to the full catalog.
    pub date_filtered: bool,
}

/// Great-circle distance between two coordinates in kilometers.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push h marginally above 1 near antipodal points, which
    // would make asin return NaN.
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Finds the station closest to `coordinate`.
///
/// With a target date, only stations whose validity window contains the date
/// are considered; if that leaves nothing, the full catalog is searched
/// instead. The date restriction is a preference, not a hard requirement.
/// Ties go to the first station in catalog order.
pub fn nearest_station(
    stations: &[Station],
    coordinate: Coordinate,
    date: Option<NaiveDate>,
) -> Result<NearestStation> {
    if stations.is_empty() {
        return Err(PipelineError::NoStation);
    }

    if let Some(date) = date {
        let candidates: Vec<&Station> = stations
            .iter()
            .filter(|station| station.is_valid_on(date))
            .collect();
        if let Some(found) = closest(&candidates, coordinate) {
            return Ok(NearestStation {
                date_filtered: true,
                ..found
            });
        }
        tracing::debug!(%date, "no station valid on target date, searching full catalog");
    }

    let all: Vec<&Station> = stations.iter().collect();
    let found = closest(&all, coordinate).ok_or(PipelineError::NoStation)?;

    Ok(found)
}

fn closest(candidates: &[&Station], coordinate: Coordinate) -> Option<NearestStation> {
    let mut best: Option<NearestStation> = None;

    for station in candidates {
        let distance_km = haversine_km(coordinate, station.coordinate);
        // Strict comparison keeps the first station on exact ties.
        if best.as_ref().map_or(true, |b| distance_km < b.distance_km) {
            best = Some(NearestStation {
                station: (*station).clone(),
                distance_km,
                date_filtered: false,
            });
        }
    }

    best
}

// -- Tests -------------------------------------------------------------------
