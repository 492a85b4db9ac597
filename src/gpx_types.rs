use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};

/// A single `<trkpt>` that carried both lat and lon.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            time: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lon: self.lon,
            lat: self.lat,
            elevation: self.elevation,
        }
    }
}

/// A map position. Serializes as a GeoJSON position: `[lon, lat]` or
/// `[lon, lat, elevation]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
    pub elevation: Option<f64>,
}

impl Coordinate {
    pub fn position(&self) -> Vec<f64> {
        match self.elevation {
            Some(ele) => vec![self.lon, self.lat, ele],
            None => vec![self.lon, self.lat],
        }
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.position().serialize(serializer)
    }
}

/// Where a photo was taken, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhotoCoordinate {
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
}

/// A geolocated photo, rendered as a static marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPhoto {
    pub coordinate: PhotoCoordinate,
    /// Camera wall-clock time; EXIF carries no zone.
    pub timestamp: Option<NaiveDateTime>,
    pub comment: String,
    pub image_ref: String,
}

/// Raw input for one photo: the image bytes plus what the host record says
/// about it.
#[derive(Debug, Clone)]
pub struct PhotoSource {
    pub bytes: Vec<u8>,
    pub comment: String,
    pub image_ref: String,
}
