use chrono::{DateTime, Utc};

use crate::gpx_types::{Coordinate, TrackPoint};

/// Parsed track: index-aligned coordinates and timestamps.
///
/// Built once from parsed points and never mutated; loading another track
/// replaces the whole value. Timestamps are not required to be monotonic and
/// may be absent for any index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateTimeline {
    coordinates: Vec<Coordinate>,
    timestamps: Vec<Option<DateTime<Utc>>>,
}

impl CoordinateTimeline {
    pub fn from_points(points: &[TrackPoint]) -> Self {
        Self {
            coordinates: points.iter().map(TrackPoint::coordinate).collect(),
            timestamps: points.iter().map(|pt| pt.time).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Index of the final point, `None` for an empty track.
    pub fn last_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    pub fn coordinate(&self, index: usize) -> Option<&Coordinate> {
        self.coordinates.get(index)
    }

    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.timestamps.get(index).copied().flatten()
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn timestamps(&self) -> &[Option<DateTime<Utc>>] {
        &self.timestamps
    }

    /// GeoJSON positions, `[lon, lat]` or `[lon, lat, ele]` per point.
    pub fn positions(&self) -> Vec<Vec<f64>> {
        self.coordinates.iter().map(Coordinate::position).collect()
    }

    /// `[min_lon, min_lat, max_lon, max_lat]`, `None` for an empty track.
    pub fn bounds(&self) -> Option<[f64; 4]> {
        let first = self.coordinates.first()?;
        let init = [first.lon, first.lat, first.lon, first.lat];
        Some(self.coordinates.iter().fold(init, |[w, s, e, n], c| {
            [w.min(c.lon), s.min(c.lat), e.max(c.lon), n.max(c.lat)]
        }))
    }
}
