use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::GpxViewerError;
use crate::gpx_types::TrackPoint;
use crate::timeline::CoordinateTimeline;

type Result<T> = std::result::Result<T, GpxViewerError>;

/// Parse GPX text into a timeline. Fails as a whole on malformed XML.
pub fn parse_track(xml: &str) -> Result<CoordinateTimeline> {
    let points = parse_gpx(xml)?;
    log::debug!("parsed {} track points", points.len());
    Ok(CoordinateTimeline::from_points(&points))
}

/// Collect every `<trkpt>` in document order, across tracks and segments.
/// Points lacking a usable lat or lon are dropped without leaving a gap.
pub fn parse_gpx(xml: &str) -> Result<Vec<TrackPoint>> {
    let mut reader = Reader::from_str(xml);
    let mut points = Vec::new();
    let mut current: Option<TrackPoint> = None;
    // Depth of the open `<trkpt>`; only its direct children are read.
    let mut trkpt_depth: Option<usize> = None;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                saw_root = true;
                match e.local_name().as_ref() {
                    b"trkpt" => {
                        depth += 1;
                        trkpt_depth = Some(depth);
                        current = parse_lat_lon(&e)?.map(|(lat, lon)| TrackPoint::new(lat, lon));
                    }
                    b"ele" if trkpt_depth == Some(depth) => {
                        let text = read_text_owned(&mut reader, &e)?;
                        if let Some(pt) = current.as_mut() {
                            pt.elevation = parse_finite(&text);
                        }
                    }
                    b"time" if trkpt_depth == Some(depth) => {
                        let text = read_text_owned(&mut reader, &e)?;
                        if let Some(pt) = current.as_mut() {
                            pt.time = parse_time(&text);
                        }
                    }
                    _ => depth += 1,
                }
            }
            Ok(Event::Empty(e)) => {
                saw_root = true;
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some((lat, lon)) = parse_lat_lon(&e)? {
                        points.push(TrackPoint::new(lat, lon));
                    }
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if e.local_name().as_ref() == b"trkpt" {
                    trkpt_depth = None;
                    if let Some(pt) = current.take() {
                        points.push(pt);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxViewerError::XmlParse(e)),
            _ => {}
        }
    }

    if !saw_root {
        return Err(GpxViewerError::MissingRoot);
    }
    if depth > 0 {
        return Err(GpxViewerError::UnclosedElement { open: depth });
    }

    Ok(points)
}

/// Read lat/lon attributes. `None` when either is missing or not a number.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<Option<(f64, f64)>> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxViewerError::XmlParse(e.into()))?;
        let val = std::str::from_utf8(&attr.value).unwrap_or_default().trim();
        match attr.key.local_name().as_ref() {
            b"lat" => lat = parse_finite(val),
            b"lon" => lon = parse_finite(val),
            _ => {}
        }
    }

    Ok(lat.zip(lon))
}

/// A number, rejecting the `NaN`/`inf` spellings `f64::from_str` accepts.
fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// RFC 3339, or a bare `YYYY-MM-DDTHH:MM:SS[.fff]` taken as UTC.
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::CData(e)) => {
                text.push_str(std::str::from_utf8(e.as_ref()).unwrap_or_default());
            }
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(GpxViewerError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_track() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Morning Run</name>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"><ele>10.0</ele></trkpt>
      <trkpt lat="35.001" lon="139.001"><ele>11.0</ele></trkpt>
      <trkpt lat="35.002" lon="139.002"><ele>12.0</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 3);
        assert!((points[2].lat - 35.002).abs() < 1e-10);
        assert!((points[2].elevation.unwrap() - 12.0).abs() < 1e-10);
    }

    #[test]
    fn test_dropped_point_leaves_no_hole() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk><trkseg>
    <trkpt lat="35.0" lon="139.0"><ele>10</ele><time>2025-01-01T00:00:00Z</time></trkpt>
    <trkpt lat="35.1" lon="139.1"><ele></ele><time>2025-01-01T00:01:00Z</time></trkpt>
    <trkpt lon="139.2"><ele>30</ele><time>2025-01-01T00:02:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;
        let tl = parse_track(xml).unwrap();
        assert_eq!(tl.positions(), vec![vec![139.0, 35.0, 10.0], vec![139.1, 35.1]]);
        assert_eq!(tl.timestamps().len(), 2);
        assert_eq!(
            tl.timestamp(0).unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
        assert_eq!(
            tl.timestamp(1).unwrap().to_rfc3339(),
            "2025-01-01T00:01:00+00:00"
        );
    }

    #[test]
    fn test_unparsable_lat_skipped() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="north" lon="139.0"/>
  <trkpt lat="35.0" lon="139.0"/>
</trkseg></trk></gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_multi_segment_concatenated() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"/>
      <trkpt lat="35.001" lon="139.001"/>
    </trkseg>
    <trkseg>
      <trkpt lat="36.0" lon="140.0"/>
    </trkseg>
  </trk>
  <trk><trkseg><trkpt lat="37.0" lon="141.0"/></trkseg></trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        let lats: Vec<f64> = points.iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![35.0, 35.001, 36.0, 37.0]);
    }

    #[test]
    fn test_waypoints_and_routes_ignored() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.0" lon="139.0"><ele>5</ele><time>2025-01-01T00:00:00Z</time></wpt>
  <rte><rtept lat="35.0" lon="139.0"/></rte>
  <trk><trkseg><trkpt lat="36.0" lon="140.0"/></trkseg></trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points, vec![TrackPoint::new(36.0, 140.0)]);
    }

    #[test]
    fn test_empty_gpx_is_empty_timeline() {
        let xml = r#"<?xml version="1.0"?><gpx version="1.1"></gpx>"#;
        let tl = parse_track(xml).unwrap();
        assert!(tl.is_empty());
    }

    #[test]
    fn test_mismatched_end_tag_fails() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="35.0" lon="139.0"></trkseg></trk></gpx>"#;
        let err = parse_track(xml).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_truncated_document_fails() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="35.0" lon="139.0"><ele>10</ele>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_no_root_fails() {
        assert!(matches!(parse_gpx(""), Err(GpxViewerError::MissingRoot)));
        assert!(matches!(
            parse_gpx("not xml at all"),
            Err(GpxViewerError::MissingRoot)
        ));
    }

    #[test]
    fn test_with_namespace_prefix() {
        let xml = r#"<?xml version="1.0"?>
<g:gpx xmlns:g="http://www.topografix.com/GPX/1/1">
  <g:trk><g:trkseg>
    <g:trkpt lat="35.0" lon="139.0"><g:ele>7.5</g:ele></g:trkpt>
  </g:trkseg></g:trk>
</g:gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].elevation, Some(7.5));
    }

    #[test]
    fn test_extensions_skipped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <time>2025-01-01T00:00:00Z</time>
        <extensions>
          <gpxtpx:TrackPointExtension xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <gpxtpx:hr>150</gpxtpx:hr>
          </gpxtpx:TrackPointExtension>
        </extensions>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 1);
        assert!(points[0].time.is_some());
    }

    #[test]
    fn test_time_formats() {
        assert_eq!(
            parse_time("2025-01-01T09:00:00+09:00").unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
        assert_eq!(
            parse_time(" 2025-01-01T00:00:00.500Z ")
                .unwrap()
                .timestamp_subsec_millis(),
            500
        );
        assert_eq!(
            parse_time("2025-01-01T00:00:00").unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
        assert!(parse_time("yesterday").is_none());
        assert!(parse_time("").is_none());
    }

    #[test]
    fn test_non_numeric_elevation_dropped() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="35.0" lon="139.0"><ele>high</ele></trkpt>
</trkseg></trk></gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points[0].elevation, None);
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="35.0" lon="139.0"><ele>NaN</ele></trkpt>
  <trkpt lat="NaN" lon="139.1"/>
  <trkpt lat="35.2" lon="inf"><ele>10</ele></trkpt>
  <trkpt lat="35.3" lon="139.3"><ele>-infinity</ele></trkpt>
</trkseg></trk></gpx>"#;
        let tl = parse_track(xml).unwrap();
        assert_eq!(tl.positions(), vec![vec![139.0, 35.0], vec![139.3, 35.3]]);
        assert_eq!(tl.bounds(), Some([139.0, 35.0, 139.3, 35.3]));
    }

    #[test]
    fn test_extension_fields_do_not_override_point() {
        let xml = r#"<gpx xmlns:x="urn:example:ext"><trk><trkseg>
  <trkpt lat="35.0" lon="139.0">
    <ele>10</ele>
    <time>2025-01-01T00:00:00Z</time>
    <extensions>
      <x:time>2030-06-01T12:00:00Z</x:time>
      <x:sensor><ele>999</ele></x:sensor>
    </extensions>
  </trkpt>
  <trkpt lat="35.1" lon="139.1"/>
</trkseg></trk></gpx>"#;
        let points = parse_gpx(xml).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].elevation, Some(10.0));
        assert_eq!(
            points[0].time.unwrap().to_rfc3339(),
            "2025-01-01T00:00:00+00:00"
        );
        assert_eq!(points[1], TrackPoint::new(35.1, 139.1));
    }
}
