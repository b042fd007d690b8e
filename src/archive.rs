//! Two-tier station archive resolution.
//!
//! DWD serves an actively overwritten `recent/` archive per reporting station
//! and rotates stations that stop reporting into frozen `historical/`
//! archives. The recent URL is deterministic; the historical filename embeds
//! the station's reporting period and must be discovered from the directory
//! listing. Discovery results are cached far longer than the listing fetch is
//! cheap, and frozen archive bytes are reused indefinitely.

use chrono::Duration;
use regex::Regex;
use reqwest::Client;

use crate::cache::CacheStore;
use crate::dwd::DwdEndpoints;
use crate::error::{PipelineError, Result};

const ARCHIVE_NAME_MAX_AGE_DAYS: i64 = 90;
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Current,
    Historical,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Current => "current",
            Tier::Historical => "historical",
        }
    }
}

/// A fetched archive together with where it was found.
#[derive(Debug, Clone)]
pub struct ResolvedArchive {
    pub station_id: u32,
    pub tier: Tier,
    pub file_name: String,
    pub data: Vec<u8>,
}

pub struct ArchiveResolver {
    client: Client,
    cache: CacheStore,
    endpoints: DwdEndpoints,
}

impl ArchiveResolver {
    pub fn new(client: Client, cache: CacheStore, endpoints: DwdEndpoints) -> Self {
        Self {
            client,
            cache,
            endpoints,
        }
    }

    /// Fetches the daily archive for a station, trying the recent tier first.
    pub async fn fetch(&self, station_id: u32) -> Result<ResolvedArchive> {
        let url = self.endpoints.recent_archive(station_id);
        let file_name = url.rsplit('/').next().unwrap_or_default().to_string();

        match self.download(&url).await {
            Ok(data) => {
                // Recent archives are overwritten upstream, so refresh the
                // cached copy on every successful fetch.
                if let Err(e) = self.cache.put_blob(&url, &data).await {
                    tracing::warn!(station_id, error = %e, "failed to cache recent archive");
                }
                Ok(ResolvedArchive {
                    station_id,
                    tier: Tier::Current,
                    file_name,
                    data,
                })
            }
            Err(e) => {
                tracing::debug!(station_id, error = %e, "recent archive unavailable, trying historical");
                match self.fetch_historical(station_id).await {
                    Ok(archive) => Ok(archive),
                    Err(historical_error) => {
                        // Only when both tiers are down does a previously
                        // fetched recent snapshot beat failing outright.
                        if let Some(blob) = self.cache.get_blob(&url).await? {
                            tracing::warn!(station_id, "both tiers unavailable, reusing cached recent archive");
                            return Ok(ResolvedArchive {
                                station_id,
                                tier: Tier::Current,
                                file_name,
                                data: blob.data,
                            });
                        }
                        Err(historical_error)
                    }
                }
            }
        }
    }

    async fn fetch_historical(&self, station_id: u32) -> Result<ResolvedArchive> {
        let file_name = self.resolve_historical_name(station_id).await?;
        let url = self.endpoints.historical_archive(&file_name);

        // Frozen archives never change; cached bytes win over a re-download.
        let data = match self.cache.get_blob(&url).await? {
            Some(blob) => blob.data,
            None => {
                let data = self
                    .download(&url)
                    .await
                    .map_err(|e| PipelineError::ArchiveFetchFailed {
                        station: station_id,
                        reason: e.to_string(),
                    })?;
                if let Err(e) = self.cache.put_blob(&url, &data).await {
                    tracing::warn!(station_id, error = %e, "failed to cache historical archive");
                }
                data
            }
        };

        Ok(ResolvedArchive {
            station_id,
            tier: Tier::Historical,
            file_name,
            data,
        })
    }

    /// Resolves the historical archive filename for a station, from the
    /// cached mapping when fresh, otherwise by scanning the directory
    /// listing. The resolved name is cached before the bytes are fetched.
    async fn resolve_historical_name(&self, station_id: u32) -> Result<String> {
        if let Some(cached) = self.cache.get_archive_name(station_id).await? {
            if cached.is_fresh(Duration::days(ARCHIVE_NAME_MAX_AGE_DAYS)) {
                return Ok(cached.file_name);
            }
        }

        let listing_url = self.endpoints.historical_listing();
        let listing = self.download(&listing_url).await.map_err(|e| {
            PipelineError::ArchiveFetchFailed {
                station: station_id,
                reason: format!("historical listing: {e}"),
            }
        })?;
        let listing = String::from_utf8_lossy(&listing);

        let file_name = find_archive_name(&listing, station_id)
            .ok_or(PipelineError::ArchiveNotFound(station_id))?;

        if let Err(e) = self.cache.put_archive_name(station_id, &file_name).await {
            tracing::warn!(station_id, error = %e, "failed to cache archive name");
        }

        Ok(file_name)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}

/// Extracts the archive filename for a station from a directory listing.
/// The name pattern is `tageswerte_KL_<id, 5 digits>_<start>_<end>_hist.zip`.
pub fn find_archive_name(listing: &str, station_id: u32) -> Option<String> {
    let pattern = format!(r"tageswerte_KL_{station_id:05}_\d{{8}}_\d{{8}}_hist\.zip");
    let re = Regex::new(&pattern).ok()?;

    re.find(listing).map(|m| m.as_str().to_string())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"<html><body>
        <a href="tageswerte_KL_00402_19350101_19701231_hist.zip">..</a>
        <a href="tageswerte_KL_00403_19500101_20221231_hist.zip">..</a>
        </body></html>"#;

    async fn resolver(server: &MockServer, dir: &TempDir) -> ArchiveResolver {
        let cache = CacheStore::open(&dir.path().join("cache.sqlite"))
            .await
            .unwrap();
        ArchiveResolver::new(Client::new(), cache, DwdEndpoints::new(&server.uri()))
    }

    #[test]
    fn should_find_archive_name_in_listing() {
        assert_eq!(
            find_archive_name(LISTING, 403).as_deref(),
            Some("tageswerte_KL_00403_19500101_20221231_hist.zip")
        );
        assert_eq!(find_archive_name(LISTING, 999), None);
    }

    #[tokio::test]
    async fn should_fetch_from_recent_tier() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00403_akt.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zipbytes".to_vec()))
            .mount(&server)
            .await;

        let archive = resolver(&server, &dir).await.fetch(403).await.unwrap();

        assert_eq!(archive.tier, Tier::Current);
        assert_eq!(archive.data, b"zipbytes");
        assert_eq!(archive.file_name, "tageswerte_KL_00403_akt.zip");
    }

    #[tokio::test]
    async fn should_fall_back_to_historical_tier() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00403_akt.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/tageswerte_KL_00403_19500101_20221231_hist.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"histbytes".to_vec()))
            .mount(&server)
            .await;

        let archive = resolver(&server, &dir).await.fetch(403).await.unwrap();

        assert_eq!(archive.tier, Tier::Historical);
        assert_eq!(archive.data, b"histbytes");
        assert_eq!(
            archive.file_name,
            "tageswerte_KL_00403_19500101_20221231_hist.zip"
        );
    }

    #[tokio::test]
    async fn should_reuse_cached_name_and_bytes_for_historical() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00403_akt.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/tageswerte_KL_00403_19500101_20221231_hist.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"histbytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server, &dir).await;
        let first = resolver.fetch(403).await.unwrap();
        let second = resolver.fetch(403).await.unwrap();

        assert_eq!(first.data, second.data);
    }

    #[tokio::test]
    async fn should_prefer_historical_tier_over_stale_recent_cache() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        // First fetch succeeds on the recent tier and populates the cache.
        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00403_akt.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"recentbytes".to_vec()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // Afterwards the station has rotated out of the recent feed.
        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00403_akt.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/tageswerte_KL_00403_19500101_20221231_hist.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"histbytes".to_vec()))
            .mount(&server)
            .await;

        let resolver = resolver(&server, &dir).await;
        let first = resolver.fetch(403).await.unwrap();
        assert_eq!(first.tier, Tier::Current);
        assert_eq!(first.data, b"recentbytes");

        let second = resolver.fetch(403).await.unwrap();
        assert_eq!(second.tier, Tier::Historical);
        assert_eq!(second.data, b"histbytes");
    }

    #[tokio::test]
    async fn should_reuse_cached_recent_archive_when_both_tiers_are_down() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00403_akt.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"recentbytes".to_vec()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00403_akt.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resolver = resolver(&server, &dir).await;
        resolver.fetch(403).await.unwrap();

        let fallback = resolver.fetch(403).await.unwrap();
        assert_eq!(fallback.tier, Tier::Current);
        assert_eq!(fallback.data, b"recentbytes");
    }

    #[tokio::test]
    async fn should_fail_when_no_listing_entry_matches() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/recent/tageswerte_KL_00999_akt.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/historical/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;

        let err = resolver(&server, &dir).await.fetch(999).await.unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveNotFound(999)));
    }
}
