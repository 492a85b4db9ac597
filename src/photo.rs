use std::io::Cursor;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, In, Tag, Value};
use regex::Regex;

use crate::error::GpxViewerError;
use crate::gpx_types::{GeoPhoto, PhotoCoordinate, PhotoSource};

type Result<T> = std::result::Result<T, GpxViewerError>;

/// `YYYY:MM:DD HH:MM:SS`, also accepting `/` in the date and `T` between
/// date and time.
static CAPTURE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[:/](\d{2})[:/](\d{2})[T ](\d{2}):(\d{2}):(\d{2})")
        .expect("capture time pattern is valid")
});

/// Capture-time tags, most specific first.
const TIME_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Read the geotag of one image.
pub fn extract_photo(bytes: &[u8], comment: &str, image_ref: &str) -> Result<GeoPhoto> {
    let exif = exif::Reader::new().read_from_container(&mut Cursor::new(bytes))?;

    let lat = dms_field(&exif, Tag::GPSLatitude, "GPSLatitude")?;
    let lon = dms_field(&exif, Tag::GPSLongitude, "GPSLongitude")?;
    let lat = if ascii_field(&exif, Tag::GPSLatitudeRef).as_deref() == Some("S") {
        -lat
    } else {
        lat
    };
    let lon = if ascii_field(&exif, Tag::GPSLongitudeRef).as_deref() == Some("W") {
        -lon
    } else {
        lon
    };

    Ok(GeoPhoto {
        coordinate: PhotoCoordinate {
            lat,
            lon,
            alt: altitude(&exif),
        },
        timestamp: capture_time(&exif),
        comment: comment.to_string(),
        image_ref: image_ref.to_string(),
    })
}

/// Geotag a batch of photos. A photo that cannot be read or has no GPS tags
/// is logged and left out; the rest are returned in input order.
pub fn extract_batch<I>(sources: I) -> Vec<GeoPhoto>
where
    I: IntoIterator<Item = PhotoSource>,
{
    sources
        .into_iter()
        .filter_map(|src| match extract_photo(&src.bytes, &src.comment, &src.image_ref) {
            Ok(photo) => Some(photo),
            Err(e) => {
                log::warn!("skipping photo '{}': {e}", src.image_ref);
                None
            }
        })
        .collect()
}

/// Degrees + minutes/60 + seconds/3600.
pub fn dms_to_decimal(deg: f64, min: f64, sec: f64) -> f64 {
    deg + min / 60.0 + sec / 3600.0
}

fn dms_field(exif: &Exif, tag: Tag, name: &'static str) -> Result<f64> {
    let field = exif
        .get_field(tag, In::PRIMARY)
        .ok_or(GpxViewerError::MissingGeoTag { tag: name })?;
    match &field.value {
        // A zero denominator yields inf or NaN; treat it as no geotag.
        Value::Rational(v) if v.len() >= 3 => {
            Some(dms_to_decimal(v[0].to_f64(), v[1].to_f64(), v[2].to_f64()))
                .filter(|d| d.is_finite())
                .ok_or(GpxViewerError::MissingGeoTag { tag: name })
        }
        _ => Err(GpxViewerError::MissingGeoTag { tag: name }),
    }
}

fn altitude(exif: &Exif) -> Option<f64> {
    let field = exif.get_field(Tag::GPSAltitude, In::PRIMARY)?;
    let alt = match &field.value {
        Value::Rational(v) => v.first()?.to_f64(),
        _ => return None,
    };
    if !alt.is_finite() {
        return None;
    }
    // GPSAltitudeRef 1 means below sea level.
    let below = exif
        .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        == Some(1);
    Some(if below { -alt } else { alt })
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|raw| String::from_utf8_lossy(raw).trim().to_string()),
        _ => None,
    }
}

fn capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    TIME_TAGS
        .iter()
        .filter_map(|tag| ascii_field(exif, *tag))
        .find_map(|text| parse_capture_time(&text))
}

/// Match the capture-time pattern anywhere in `text`. No match, or a match
/// that is not a real calendar date, gives `None`.
pub fn parse_capture_time(text: &str) -> Option<NaiveDateTime> {
    let caps = CAPTURE_TIME.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?)
}
