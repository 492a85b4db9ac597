pub mod converter;
pub mod error;
pub mod gpx_types;
pub mod js_host;
pub mod logging;
pub mod options;
pub mod parser;
pub mod photo;
pub mod playback;
pub mod timeline;
pub mod view_sync;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::gpx_types::{GeoPhoto, PhotoSource};
use crate::js_host::{JsScheduler, JsViewSink, PlaybackHost, ViewHost};
use crate::options::ViewerOptions;
use crate::playback::{Direction, FrameToken, PlaybackEngine};
use crate::view_sync::ViewSync;

/// Install the console logger (`"error"`..`"trace"`, default `"info"`).
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: Option<String>) {
    console_error_panic_hook::set_once();
    logging::init(logging::parse_level(level.as_deref()));
}

/// Parse GPX text into the track FeatureCollection, returned as a JS object.
#[wasm_bindgen(js_name = gpxToTrack)]
pub fn gpx_to_track(gpx_string: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let timeline = parser::parse_track(gpx_string)?;
    let fc = converter::track_to_feature_collection(&timeline, &opts);
    to_js(&fc)
}

/// Parse GPX text into the track FeatureCollection, returned as a JSON string.
#[wasm_bindgen(js_name = gpxToTrackString)]
pub fn gpx_to_track_string(gpx_string: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let timeline = parser::parse_track(gpx_string)?;
    let fc = converter::track_to_feature_collection(&timeline, &opts);
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Read one photo's geotag. Throws when the image has no usable GPS data.
#[wasm_bindgen(js_name = geotagPhoto)]
pub fn geotag_photo(bytes: &[u8], comment: &str, image_ref: &str) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let photo = photo::extract_photo(bytes, comment, image_ref)?;
    to_js(&photo)
}

/// Collects photos and geotags them together; unreadable ones are skipped.
#[wasm_bindgen]
pub struct PhotoBatch {
    sources: Vec<PhotoSource>,
}

#[wasm_bindgen]
impl PhotoBatch {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PhotoBatch {
        console_error_panic_hook::set_once();
        PhotoBatch {
            sources: Vec::new(),
        }
    }

    pub fn add(&mut self, bytes: Vec<u8>, comment: String, image_ref: String) {
        self.sources.push(PhotoSource {
            bytes,
            comment,
            image_ref,
        });
    }

    /// Marker FeatureCollection for every photo that could be geolocated.
    #[wasm_bindgen(js_name = toGeoJson)]
    pub fn to_geojson(&mut self, options: JsValue) -> Result<JsValue, JsValue> {
        let opts = parse_options(options)?;
        let photos: Vec<GeoPhoto> = photo::extract_batch(std::mem::take(&mut self.sources));
        to_js(&converter::photos_to_feature_collection(&photos, &opts))
    }
}

impl Default for PhotoBatch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct LoadedTrack {
    track: geojson::FeatureCollection,
    rows: Vec<converter::TrackRow>,
}

/// One mounted viewer: owns the playback engine for the current track and
/// keeps the page's map and list in step with it.
#[wasm_bindgen]
pub struct GpxViewer {
    engine: PlaybackEngine<JsScheduler>,
    options: ViewerOptions,
}

#[wasm_bindgen]
impl GpxViewer {
    #[wasm_bindgen(constructor)]
    pub fn new(host: PlaybackHost, view: ViewHost, options: JsValue) -> Result<GpxViewer, JsValue> {
        console_error_panic_hook::set_once();

        let options = parse_options(options)?;
        let mut engine = PlaybackEngine::new(JsScheduler::new(host), options.repeat_interval());

        ViewSync::new(JsViewSink::new(view.clone())).attach(&mut engine);
        engine.subscribe(move |event| match to_js(event) {
            Ok(value) => view.on_playback_event(value),
            Err(e) => log::error!("cannot forward playback event: {e:?}"),
        });

        Ok(GpxViewer { engine, options })
    }

    /// Replace the current track. Returns `{ track, rows }` for the map and
    /// list renderers. On a parse error the previous track stays loaded.
    #[wasm_bindgen(js_name = loadGpx)]
    pub fn load_gpx(&mut self, gpx_string: &str) -> Result<JsValue, JsValue> {
        let timeline = parser::parse_track(gpx_string).inspect_err(|e| {
            log::warn!("GPX load failed: {e}");
        })?;
        let loaded = LoadedTrack {
            track: converter::track_to_feature_collection(&timeline, &self.options),
            rows: converter::to_rows(&timeline, &self.options),
        };
        let value = to_js(&loaded)?;
        self.engine.load(timeline);
        Ok(value)
    }

    /// Show an empty map, e.g. for a record without a GPX file.
    pub fn clear(&mut self) {
        self.engine.load(Default::default());
    }

    pub fn first(&mut self) {
        self.engine.first();
    }

    pub fn last(&mut self) {
        self.engine.last();
    }

    pub fn play(&mut self) {
        self.engine.play();
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    /// Press-and-hold on "prev".
    #[wasm_bindgen(js_name = stepPrevStart)]
    pub fn step_prev_start(&mut self) {
        self.engine.start_repeat(Direction::Backward);
    }

    /// Press-and-hold on "next".
    #[wasm_bindgen(js_name = stepNextStart)]
    pub fn step_next_start(&mut self) {
        self.engine.start_repeat(Direction::Forward);
    }

    /// Release or pointer-leave on either step button.
    #[wasm_bindgen(js_name = stepEnd)]
    pub fn step_end(&mut self) {
        self.engine.stop_repeat();
    }

    #[wasm_bindgen(js_name = jumpTo)]
    pub fn jump_to(&mut self, index: f64) {
        if let Some(index) = js_index(index) {
            self.engine.jump_to(index);
        }
    }

    #[wasm_bindgen(js_name = onRepeatTick)]
    pub fn on_repeat_tick(&mut self, id: u32) {
        self.engine.on_repeat_tick(id);
    }

    #[wasm_bindgen(js_name = onFrame)]
    pub fn on_frame(&mut self, token: u32) {
        self.engine.on_frame(FrameToken(token));
    }

    #[wasm_bindgen(getter)]
    pub fn playhead(&self) -> u32 {
        self.engine.playhead() as u32
    }

    #[wasm_bindgen(getter, js_name = isPlaying)]
    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> u32 {
        self.engine.timeline().len() as u32
    }
}

/// A JS number as a playhead index. NaN has none; `as` saturates
/// out-of-range values, which the engine then clamps.
fn js_index(value: f64) -> Option<i64> {
    (!value.is_nan()).then_some(value as i64)
}

fn parse_options(options: JsValue) -> Result<ViewerOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(ViewerOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_index() {
        assert_eq!(js_index(3.0), Some(3));
        assert_eq!(js_index(2.9), Some(2));
        assert_eq!(js_index(-1.5), Some(-1));
        assert_eq!(js_index(f64::NAN), None);
        assert_eq!(js_index(1e300), Some(i64::MAX));
        assert_eq!(js_index(f64::INFINITY), Some(i64::MAX));
        assert_eq!(js_index(f64::NEG_INFINITY), Some(i64::MIN));
    }
}
