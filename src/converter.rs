use std::fmt::Write;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::gpx_types::{Coordinate, GeoPhoto};
use crate::options::ViewerOptions;
use crate::timeline::CoordinateTimeline;

/// One line of the point list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRow {
    pub index: usize,
    /// 6 decimals
    pub lat: String,
    /// 6 decimals
    pub lon: String,
    /// 1 decimal, empty when the point had no elevation
    pub alt: String,
    /// Empty when the point had no time
    pub timestamp: String,
}

/// The track as a single LineString feature, with per-point timestamps in
/// `properties.timestamps`. An empty track gives an empty collection.
pub fn track_to_feature_collection(
    timeline: &CoordinateTimeline,
    opts: &ViewerOptions,
) -> FeatureCollection {
    if timeline.is_empty() {
        return FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        };
    }

    let coords: Vec<Vec<f64>> = timeline
        .coordinates()
        .iter()
        .map(|c| position(c, opts.include_elevation))
        .collect();

    let timestamps: Vec<JsonValue> = timeline
        .timestamps()
        .iter()
        .map(|t| match t {
            Some(t) => JsonValue::String(rfc3339(t)),
            None => JsonValue::Null,
        })
        .collect();

    let mut props = Map::new();
    props.insert("timestamps".to_string(), JsonValue::Array(timestamps));

    FeatureCollection {
        bbox: timeline.bounds().map(|b| b.to_vec()),
        features: vec![Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(coords))),
            id: None,
            properties: Some(props),
            foreign_members: None,
        }],
        foreign_members: None,
    }
}

/// One Point feature per photo, for the marker layer.
pub fn photos_to_feature_collection(photos: &[GeoPhoto], opts: &ViewerOptions) -> FeatureCollection {
    let features = photos
        .iter()
        .map(|photo| {
            let c = photo.coordinate;
            let coords = match (opts.include_elevation, c.alt) {
                (true, Some(alt)) => vec![c.lon, c.lat, alt],
                _ => vec![c.lon, c.lat],
            };

            let mut props = Map::new();
            props.insert(
                "comment".to_string(),
                JsonValue::String(photo.comment.clone()),
            );
            props.insert(
                "imageRef".to_string(),
                JsonValue::String(photo.image_ref.clone()),
            );
            props.insert(
                "timestamp".to_string(),
                match &photo.timestamp {
                    Some(t) => JsonValue::String(format_naive(t, &opts.timestamp_format)),
                    None => JsonValue::Null,
                },
            );

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(coords))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Rows for the point list, one per timeline index.
pub fn to_rows(timeline: &CoordinateTimeline, opts: &ViewerOptions) -> Vec<TrackRow> {
    let offset = opts.display_offset();
    timeline
        .coordinates()
        .iter()
        .zip(timeline.timestamps())
        .enumerate()
        .map(|(index, (c, t))| TrackRow {
            index,
            lat: format!("{:.6}", c.lat),
            lon: format!("{:.6}", c.lon),
            alt: c.elevation.map(|e| format!("{e:.1}")).unwrap_or_default(),
            timestamp: t
                .map(|t| format_naive(&t.with_timezone(&offset).naive_local(), &opts.timestamp_format))
                .unwrap_or_default(),
        })
        .collect()
}

pub(crate) fn rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Format with a user-supplied pattern; an unusable pattern falls back to
/// ISO 8601.
fn format_naive(t: &NaiveDateTime, fmt: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", t.format(fmt)).is_err() {
        return t.format("%Y-%m-%dT%H:%M:%S").to_string();
    }
    out
}

fn position(c: &Coordinate, include_elevation: bool) -> Vec<f64> {
    if include_elevation {
        c.position()
    } else {
        vec![c.lon, c.lat]
    }
}
