use crate::gpx_types::Coordinate;
use crate::playback::{PlaybackEngine, PlaybackEvent, Scheduler};

/// Renderers that follow the playhead: the map and the point list.
pub trait ViewSink {
    fn set_center(&mut self, coordinate: &Coordinate);

    fn set_point(&mut self, coordinate: &Coordinate);

    fn deselect_row(&mut self, index: usize);

    fn select_row(&mut self, index: usize);

    fn scroll_row_into_view(&mut self, index: usize);
}

/// Applies position changes to a [`ViewSink`]. Reads events only; row clicks
/// are routed back to the engine by the integration layer.
pub struct ViewSync<V: ViewSink> {
    sink: V,
    selected: Option<usize>,
}

impl<V: ViewSink> ViewSync<V> {
    pub fn new(sink: V) -> Self {
        Self {
            sink,
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn sink(&self) -> &V {
        &self.sink
    }

    pub fn on_event(&mut self, event: &PlaybackEvent) {
        let pos = match event {
            PlaybackEvent::PositionChanged(pos) => pos,
            PlaybackEvent::TrackLoaded { .. } => {
                // Unhighlight while the old list is still on screen.
                if let Some(prev) = self.selected.take() {
                    self.sink.deselect_row(prev);
                }
                return;
            }
            PlaybackEvent::PlayStateChanged { .. } => return,
        };
        self.sink.set_center(&pos.coordinate);
        self.sink.set_point(&pos.coordinate);
        if let Some(prev) = self.selected.filter(|prev| *prev != pos.index) {
            self.sink.deselect_row(prev);
        }
        self.sink.select_row(pos.index);
        self.sink.scroll_row_into_view(pos.index);
        self.selected = Some(pos.index);
    }
}

impl<V: ViewSink + 'static> ViewSync<V> {
    /// Subscribe to `engine`, moving this view into the listener.
    pub fn attach<S: Scheduler>(mut self, engine: &mut PlaybackEngine<S>) {
        engine.subscribe(move |event| self.on_event(event));
    }
}
