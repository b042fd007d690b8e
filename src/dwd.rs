//! URL layout of the DWD open-data daily climate ("daily/kl") tree.
//!
//! Stations that still report live under `recent/`; once a station stops
//! reporting, its data is frozen into a `historical/` archive whose exact
//! filename has to be discovered from the directory listing.

/// Production base of the daily climate observations tree.
pub const DWD_BASE_URL: &str =
    "https://opendata.dwd.de/climate_environment/CDC/observations_germany/climate/daily/kl";

const STATION_LIST_FILE: &str = "KL_Tageswerte_Beschreibung_Stationen.txt";

#[derive(Debug, Clone)]
pub struct DwdEndpoints {
    base_url: String,
}

impl Default for DwdEndpoints {
    fn default() -> Self {
        Self::new(DWD_BASE_URL)
    }
}

impl DwdEndpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn recent_station_list(&self) -> String {
        format!("{}/recent/{}", self.base_url, STATION_LIST_FILE)
    }

    pub fn historical_station_list(&self) -> String {
        format!("{}/historical/{}", self.base_url, STATION_LIST_FILE)
    }

    /// Deterministic archive URL for a station still in the recent feed.
    pub fn recent_archive(&self, station_id: u32) -> String {
        format!(
            "{}/recent/tageswerte_KL_{:05}_akt.zip",
            self.base_url, station_id
        )
    }

    /// Directory listing that names every frozen historical archive.
    pub fn historical_listing(&self) -> String {
        format!("{}/historical/", self.base_url)
    }

    pub fn historical_archive(&self, file_name: &str) -> String {
        format!("{}/historical/{}", self.base_url, file_name)
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_recent_archive_url_with_zero_padded_id() {
        let endpoints = DwdEndpoints::default();
        assert_eq!(
            endpoints.recent_archive(403),
            format!("{DWD_BASE_URL}/recent/tageswerte_KL_00403_akt.zip")
        );
    }

    #[test]
    fn should_strip_trailing_slash_from_base() {
        let endpoints = DwdEndpoints::new("http://localhost:8080/kl/");
        assert_eq!(
            endpoints.historical_listing(),
            "http://localhost:8080/kl/historical/"
        );
    }
}
