//! SQLite-backed cache shared by all pipeline components.
//!
//! Three logical tables: raw downloaded blobs, geocoded places, and resolved
//! historical archive filenames. All writes are upserts with last-writer-wins
//! semantics; every entry carries the time it was stored so callers can apply
//! their own staleness policy.

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

use crate::error::Result;
use crate::model::{Coordinate, PlaceLookup};

/// A cached byte payload together with the time it was fetched.
#[derive(Debug, Clone)]
pub struct CachedBlob {
    pub data: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedBlob {
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        Utc::now() - self.fetched_at < max_age
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    /// Opens (creating if necessary) the cache database at `path`.
    ///
    /// Failure here is fatal to the process: the pipeline needs a durable
    /// store shared across invocations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                fetched_at INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS places (
                postal_code TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                label TEXT NOT NULL,
                fetched_at INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS archive_names (
                station_id INTEGER PRIMARY KEY,
                file_name TEXT NOT NULL,
                resolved_at INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub async fn get_blob(&self, key: &str) -> Result<Option<CachedBlob>> {
        let row = sqlx::query("SELECT data, fetched_at FROM blobs WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| CachedBlob {
            data: row.get("data"),
            fetched_at: timestamp(row.get("fetched_at")),
        }))
    }

    pub async fn put_blob(&self, key: &str, data: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO blobs (key, data, fetched_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data,
                                            fetched_at = excluded.fetched_at",
        )
        .bind(key)
        .bind(data)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_place(&self, postal_code: &str) -> Result<Option<PlaceLookup>> {
        let row = sqlx::query(
            "SELECT latitude, longitude, label, fetched_at FROM places WHERE postal_code = ?",
        )
        .bind(postal_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| PlaceLookup {
            postal_code: postal_code.to_string(),
            coordinate: Coordinate::new(row.get("latitude"), row.get("longitude")),
            label: row.get("label"),
            fetched_at: timestamp(row.get("fetched_at")),
        }))
    }

    pub async fn put_place(&self, place: &PlaceLookup) -> Result<()> {
        sqlx::query(
            "INSERT INTO places (postal_code, latitude, longitude, label, fetched_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(postal_code) DO UPDATE SET latitude = excluded.latitude,
                                                    longitude = excluded.longitude,
                                                    label = excluded.label,
                                                    fetched_at = excluded.fetched_at",
        )
        .bind(&place.postal_code)
        .bind(place.coordinate.latitude)
        .bind(place.coordinate.longitude)
        .bind(&place.label)
        .bind(place.fetched_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_archive_name(&self, station_id: u32) -> Result<Option<CachedArchiveName>> {
        let row = sqlx::query("SELECT file_name, resolved_at FROM archive_names WHERE station_id = ?")
            .bind(station_id as i64)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| CachedArchiveName {
            file_name: row.get("file_name"),
            resolved_at: timestamp(row.get("resolved_at")),
        }))
    }

    pub async fn put_archive_name(&self, station_id: u32, file_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO archive_names (station_id, file_name, resolved_at) VALUES (?, ?, ?)
             ON CONFLICT(station_id) DO UPDATE SET file_name = excluded.file_name,
                                                   resolved_at = excluded.resolved_at",
        )
        .bind(station_id as i64)
        .bind(file_name)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// A resolved historical archive filename with its discovery time.
#[derive(Debug, Clone)]
pub struct CachedArchiveName {
    pub file_name: String,
    pub resolved_at: DateTime<Utc>,
}

impl CachedArchiveName {
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        Utc::now() - self.resolved_at < max_age
    }
}

fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or_default()
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> CacheStore {
        CacheStore::open(&dir.path().join("cache.sqlite"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn should_round_trip_blob() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        assert!(store.get_blob("stations").await.unwrap().is_none());

        store.put_blob("stations", b"payload").await.unwrap();
        let blob = store.get_blob("stations").await.unwrap().unwrap();

        assert_eq!(blob.data, b"payload");
        assert!(blob.is_fresh(Duration::hours(24)));
    }

    #[tokio::test]
    async fn should_overwrite_blob_on_second_put() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.put_blob("k", b"old").await.unwrap();
        store.put_blob("k", b"new").await.unwrap();

        let blob = store.get_blob("k").await.unwrap().unwrap();
        assert_eq!(blob.data, b"new");
    }

    #[tokio::test]
    async fn should_round_trip_place() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let place = PlaceLookup {
            postal_code: "10115".to_string(),
            coordinate: Coordinate::new(52.532, 13.385),
            label: "Berlin, Berlin".to_string(),
            fetched_at: Utc::now(),
        };
        store.put_place(&place).await.unwrap();

        let cached = store.get_place("10115").await.unwrap().unwrap();
        assert_eq!(cached.coordinate, place.coordinate);
        assert_eq!(cached.label, "Berlin, Berlin");

        assert!(store.get_place("99999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_round_trip_archive_name() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store
            .put_archive_name(403, "tageswerte_KL_00403_19500101_20221231_hist.zip")
            .await
            .unwrap();

        let cached = store.get_archive_name(403).await.unwrap().unwrap();
        assert_eq!(
            cached.file_name,
            "tageswerte_KL_00403_19500101_20221231_hist.zip"
        );
        assert!(cached.is_fresh(Duration::days(90)));
    }
}
