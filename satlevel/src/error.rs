use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving areas of interest and retrieving station data.
/// Every error surfaces to the immediate caller; nothing is retried internally.
#[derive(Debug, Error)]
pub enum SatlevelError {
    /// The file cannot be opened or holds no layer/band
    #[error("could not open geospatial source {path:?}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },

    /// The satellite archive holds no file matching the reference band pattern
    #[error("no reference band matching `{pattern}` found in archive {archive:?}")]
    GranuleNotFound { archive: PathBuf, pattern: String },

    /// Projection metadata is absent or does not describe a projected CRS
    #[error("could not detect a projected CRS for {path:?}: {reason}")]
    CrsDetection { path: PathBuf, reason: String },

    #[error("could not reproject from EPSG:{from} to EPSG:{to}: {reason}")]
    Reprojection { from: u32, to: u32, reason: String },

    #[error("malformed acquisition identifier `{identifier}`: {reason}")]
    FilenameFormat { identifier: String, reason: String },

    #[error("invalid time window `{value}`: {reason}")]
    TimeWindow { value: String, reason: String },

    /// Non-success HTTP status from the observation service
    #[error("observation service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A station id returned by the service cannot be used as an output file name
    #[error("station id `{station_id}` is not a valid file name")]
    InvalidStationId { station_id: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SatlevelError>;

impl SatlevelError {
    pub(crate) fn source_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SatlevelError::SourceOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn crs_detection(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SatlevelError::CrsDetection {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
