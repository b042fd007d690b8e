//! Shared data types for the resolution pipeline.

use chrono::{DateTime, Utc};

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A cached geocoding result for one postal code.
#[derive(Debug, Clone)]
pub struct PlaceLookup {
    pub postal_code: String,
    pub coordinate: Coordinate,
    pub label: String,
    pub fetched_at: DateTime<Utc>,
}

// -- Tests -------------------------------------------------------------------
