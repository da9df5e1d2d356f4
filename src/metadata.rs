// src/metadata.rs

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::path::Path;

pub const NO_GPS: &str = "Sin_GPS";
pub const NO_DATE: &str = "Sin_Fecha";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
    Device,
    LocalFilesystem,
}

impl fmt::Display for OriginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginKind::Device => f.write_str("device"),
            OriginKind::LocalFilesystem => f.write_str("local filesystem"),
        }
    }
}

/// One file offered by the active origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub name: String,
    pub origin: OriginKind,
    pub source_path: String,
}

impl MediaCandidate {
    pub fn is_video(&self) -> bool {
        mime_guess::from_path(Path::new(&self.name))
            .first()
            .map(|m| m.type_() == mime::VIDEO)
            .unwrap_or(false)
    }
}

/// Signed decimal degrees: north and east are positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedMetadata {
    pub capture_date: Option<NaiveDate>,
    pub coordinates: Option<Coordinates>,
    pub is_video: bool,
}

impl ExtractedMetadata {
    pub fn date_label(&self) -> String {
        date_label(self.capture_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceLabel(String);

impl PlaceLabel {
    pub fn new(city: &str, country: &str) -> Self {
        PlaceLabel(format!("{}_{}", city.trim(), country.trim()))
    }

    pub fn no_gps() -> Self {
        PlaceLabel(NO_GPS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `YYYY-MM`, or `Sin_Fecha` when the date is unknown.
pub fn date_label(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!("{:04}-{:02}", d.year(), d.month()),
        None => NO_DATE.to_string(),
    }
}

/// Destination folder name for a place and date label.
pub fn folder_key(place: &PlaceLabel, date_label: &str) -> String {
    format!("{}_{}", place, date_label)
        .replace(' ', "_")
        .replace(',', "")
}
