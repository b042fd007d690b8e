//! Pipeline error kinds.
//!
//! Every per-postal-code failure is one of these variants; the orchestrator
//! turns them into row status text rather than letting them escape the batch.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no geocoding result for postal code {0}")]
    GeocodeNotFound(String),

    #[error("station catalog contains no stations")]
    NoStations,

    #[error("no station available for lookup")]
    NoStation,

    #[error("no archive found for station {0}")]
    ArchiveNotFound(u32),

    #[error("archive fetch failed for station {station}: {reason}")]
    ArchiveFetchFailed { station: u32, reason: String },

    #[error("no measurement within {fallback_days} days before {target} (last tried {last_tried})")]
    NoDataInRange {
        target: NaiveDate,
        last_tried: NaiveDate,
        fallback_days: u32,
    },

    #[error("malformed archive payload: {0}")]
    MalformedPayload(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("target date {0} is in the future")]
    FutureDate(NaiveDate),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("cache store error: {0}")]
    Cache(#[from] sqlx::Error),

    #[error("archive container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
