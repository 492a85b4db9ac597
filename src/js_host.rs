use std::time::Duration;

use wasm_bindgen::prelude::*;

use crate::gpx_types::Coordinate;
use crate::playback::{FrameToken, Scheduler, TimerId};
use crate::view_sync::ViewSink;

#[wasm_bindgen]
extern "C" {
    /// Timer services supplied by the page. Implementations wrap
    /// `setInterval`/`clearInterval`/`requestAnimationFrame` and call
    /// `GpxViewer.onRepeatTick` / `GpxViewer.onFrame` when they fire.
    pub type PlaybackHost;

    #[wasm_bindgen(method, js_name = startInterval)]
    fn start_interval(this: &PlaybackHost, period_ms: u32) -> u32;

    #[wasm_bindgen(method, js_name = cancelInterval)]
    fn cancel_interval(this: &PlaybackHost, id: u32);

    #[wasm_bindgen(method, js_name = requestFrame)]
    fn request_frame(this: &PlaybackHost, token: u32);

    /// Map and list renderers supplied by the page. Called synchronously from
    /// inside viewer methods, so these must not call back into the viewer;
    /// defer with a microtask instead.
    #[derive(Clone)]
    pub type ViewHost;

    #[wasm_bindgen(method, js_name = setCenter)]
    fn set_center(this: &ViewHost, position: Vec<f64>);

    #[wasm_bindgen(method, js_name = setPoint)]
    fn set_point(this: &ViewHost, position: Vec<f64>);

    #[wasm_bindgen(method, js_name = deselectRow)]
    fn deselect_row(this: &ViewHost, index: u32);

    #[wasm_bindgen(method, js_name = selectRow)]
    fn select_row(this: &ViewHost, index: u32);

    #[wasm_bindgen(method, js_name = scrollRowIntoView)]
    fn scroll_row_into_view(this: &ViewHost, index: u32);

    #[wasm_bindgen(method, js_name = onPlaybackEvent)]
    pub fn on_playback_event(this: &ViewHost, event: JsValue);
}

pub struct JsScheduler {
    host: PlaybackHost,
}

impl JsScheduler {
    pub fn new(host: PlaybackHost) -> Self {
        Self { host }
    }
}

impl Scheduler for JsScheduler {
    fn start_interval(&mut self, period: Duration) -> TimerId {
        let period_ms = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
        self.host.start_interval(period_ms)
    }

    fn cancel_interval(&mut self, id: TimerId) {
        self.host.cancel_interval(id);
    }

    fn request_frame(&mut self, token: FrameToken) {
        self.host.request_frame(token.0);
    }
}

pub struct JsViewSink {
    host: ViewHost,
}

impl JsViewSink {
    pub fn new(host: ViewHost) -> Self {
        Self { host }
    }
}

impl ViewSink for JsViewSink {
    fn set_center(&mut self, coordinate: &Coordinate) {
        self.host.set_center(coordinate.position());
    }

    fn set_point(&mut self, coordinate: &Coordinate) {
        self.host.set_point(coordinate.position());
    }

    fn deselect_row(&mut self, index: usize) {
        self.host.deselect_row(index as u32);
    }

    fn select_row(&mut self, index: usize) {
        self.host.select_row(index as u32);
    }

    fn scroll_row_into_view(&mut self, index: usize) {
        self.host.scroll_row_into_view(index as u32);
    }
}
