use exif::Error as ExifError;
use serde_json::Error as SerdeJsonError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Walkdir error: {0}")]
    Walkdir(#[from] walkdir::Error),

    #[error("EXIF error: {0}")]
    Exif(#[from] ExifError),

    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Device bridge error: {0}")]
    Bridge(String),

    #[error("No origin available: {0}")]
    OriginUnavailable(String),

    #[error("Ledger file {path:?} is unreadable: {reason}")]
    LedgerCorrupt { path: PathBuf, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Destination already holds {0:?}")]
    DestinationExists(PathBuf),
}

/// Failures of a single reverse-geocoding lookup.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder answered with status {0}")]
    Status(u16),

    #[error("no address for the coordinates")]
    NoResult,

    #[error("malformed address: {0:?}")]
    MalformedAddress(String),
}
