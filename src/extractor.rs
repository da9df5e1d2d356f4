use crate::error::AppError;
use crate::metadata::{Coordinates, ExtractedMetadata, MediaCandidate};
use crate::source::MediaSource;
use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const CAPTURE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// What the embedded EXIF block of an image yields.
#[derive(Debug, Default, PartialEq)]
pub struct ImageTags {
    pub captured_at: Option<NaiveDateTime>,
    pub coordinates: Option<Coordinates>,
}

/// Classifies a materialized file.
///
/// Images rely on embedded metadata only. Videos take the origin's modification date,
/// which may be the transfer time rather than the capture time, and never carry coordinates.
pub fn extract(
    local_path: &Path,
    candidate: &MediaCandidate,
    source: &dyn MediaSource,
) -> ExtractedMetadata {
    if candidate.is_video() {
        return ExtractedMetadata {
            capture_date: source.modified_date(candidate),
            coordinates: None,
            is_video: true,
        };
    }

    let tags = match read_image_tags(local_path) {
        Ok(Some(tags)) => tags,
        Ok(None) => {
            log::debug!("No EXIF data found for {:?}", local_path);
            ImageTags::default()
        }
        Err(e) => {
            log::warn!("Unreadable EXIF data in {:?}: {}", local_path, e);
            ImageTags::default()
        }
    };

    ExtractedMetadata {
        capture_date: tags.captured_at.map(|t| t.date()),
        coordinates: tags.coordinates,
        is_video: false,
    }
}

/// `Ok(None)` when the file simply has no EXIF block.
pub fn read_image_tags(path: &Path) -> Result<Option<ImageTags>, AppError> {
    log::trace!("Extracting EXIF data for image: {:?}", path);
    let mut buf_reader = BufReader::new(File::open(path)?);
    let exif = match Reader::new().read_from_container(&mut buf_reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let tags = ImageTags {
        captured_at: capture_time(&exif),
        coordinates: gps_coordinates(&exif),
    };
    log::trace!("EXIF tags for {:?}: {:?}", path, tags);
    Ok(Some(tags))
}

fn capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;
    let text = ascii_value(&field.value)?;
    NaiveDateTime::parse_from_str(text.trim(), CAPTURE_TIME_FORMAT)
        .map_err(|e| log::debug!("Bad DateTimeOriginal {:?}: {}", text, e))
        .ok()
}

fn gps_coordinates(exif: &Exif) -> Option<Coordinates> {
    let lat_ref = ascii_value(&exif.get_field(Tag::GPSLatitudeRef, In::PRIMARY)?.value)?;
    let lat = dms_triple(&exif.get_field(Tag::GPSLatitude, In::PRIMARY)?.value)?;
    let lon_ref = ascii_value(&exif.get_field(Tag::GPSLongitudeRef, In::PRIMARY)?.value)?;
    let lon = dms_triple(&exif.get_field(Tag::GPSLongitude, In::PRIMARY)?.value)?;

    Some(Coordinates {
        latitude: dms_to_decimal(lat, &lat_ref),
        longitude: dms_to_decimal(lon, &lon_ref),
    })
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string()),
        _ => None,
    }
}

fn dms_triple(value: &Value) -> Option<[f64; 3]> {
    match value {
        Value::Rational(parts) if parts.len() >= 3 && parts.iter().all(|r| r.denom != 0) => {
            Some([parts[0].to_f64(), parts[1].to_f64(), parts[2].to_f64()])
        }
        _ => None,
    }
}

/// Degrees, minutes, seconds to signed decimal degrees; `S` and `W` are negative.
pub fn dms_to_decimal(dms: [f64; 3], reference: &str) -> f64 {
    let [degrees, minutes, seconds] = dms;
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.trim() {
        "S" | "W" => -decimal,
        _ => decimal,
    }
}
