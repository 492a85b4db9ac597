//! Playhead state machine.
//!
//! Three inputs drive the playhead: discrete jumps (first, last, row
//! selection), held prev/next buttons that repeat on a fixed interval, and
//! frame-driven auto-play. Timers belong to the host, reached through
//! [`Scheduler`]; the host calls [`PlaybackEngine::on_repeat_tick`] and
//! [`PlaybackEngine::on_frame`] when they fire. Callbacks that outlived the
//! run that scheduled them carry a stale id or token and are ignored, so
//! cancellation never has to reach into the host's queue.
//!
//! Starting playback cancels any held-button repeat and starting a repeat
//! stops playback, so at most one driver advances the playhead at a time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gpx_types::Coordinate;
use crate::timeline::CoordinateTimeline;

/// Host handle for a repeating timer.
pub type TimerId = u32;

/// Identifies one play run. Frames requested by an earlier run are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken(pub u32);

/// Timer services provided by the host.
pub trait Scheduler {
    /// Start a timer that calls `on_repeat_tick(id)` every `period` until
    /// cancelled.
    fn start_interval(&mut self, period: Duration) -> TimerId;

    fn cancel_interval(&mut self, id: TimerId);

    /// Call `on_frame(token)` once on the next rendered frame.
    fn request_frame(&mut self, token: FrameToken);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    fn delta(self) -> i64 {
        match self {
            Self::Backward => -1,
            Self::Forward => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Repeating,
    Playing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub playhead: usize,
    pub is_playing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionChanged {
    pub index: usize,
    pub coordinate: Coordinate,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_playing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    PositionChanged(PositionChanged),
    #[serde(rename_all = "camelCase")]
    PlayStateChanged { is_playing: bool },
    /// A new track replaced the old one; indices from earlier events are void.
    TrackLoaded { length: usize },
}

#[derive(Debug, Clone, Copy)]
struct RepeatTimer {
    id: TimerId,
    direction: Direction,
}

type Listener = Box<dyn FnMut(&PlaybackEvent)>;

pub struct PlaybackEngine<S: Scheduler> {
    timeline: CoordinateTimeline,
    state: PlaybackState,
    repeat: Option<RepeatTimer>,
    generation: u32,
    repeat_interval: Duration,
    scheduler: S,
    listeners: Vec<Listener>,
}

impl<S: Scheduler> PlaybackEngine<S> {
    pub fn new(scheduler: S, repeat_interval: Duration) -> Self {
        Self {
            timeline: CoordinateTimeline::default(),
            state: PlaybackState::default(),
            repeat: None,
            generation: 0,
            repeat_interval,
            scheduler,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&PlaybackEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Replace the track. Any repeat or playback is cancelled and the state
    /// resets to the first point.
    pub fn load(&mut self, timeline: CoordinateTimeline) {
        self.stop_repeat();
        self.stop();
        self.generation = self.generation.wrapping_add(1);
        self.timeline = timeline;
        self.state = PlaybackState::default();
        log::debug!("loaded track with {} points", self.timeline.len());
        self.emit(PlaybackEvent::TrackLoaded {
            length: self.timeline.len(),
        });
        if !self.timeline.is_empty() {
            self.emit_position();
        }
    }

    pub fn timeline(&self) -> &CoordinateTimeline {
        &self.timeline
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playhead(&self) -> usize {
        self.state.playhead
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn mode(&self) -> Mode {
        if self.state.is_playing {
            Mode::Playing
        } else if self.repeat.is_some() {
            Mode::Repeating
        } else {
            Mode::Idle
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Move the playhead to `index`, clamped into the track. Emits only when
    /// the playhead actually moves.
    pub fn jump_to(&mut self, index: i64) {
        let Some(last) = self.timeline.last_index() else {
            return;
        };
        let target = index.clamp(0, last as i64) as usize;
        if target == self.state.playhead {
            return;
        }
        self.state.playhead = target;
        self.emit_position();
    }

    pub fn first(&mut self) {
        self.jump_to(0);
    }

    pub fn last(&mut self) {
        if let Some(last) = self.timeline.last_index() {
            self.jump_to(last as i64);
        }
    }

    /// Begin held-button stepping. A no-op while a repeat timer is live.
    pub fn start_repeat(&mut self, direction: Direction) {
        if self.repeat.is_some() || self.timeline.is_empty() {
            return;
        }
        self.stop();
        let id = self.scheduler.start_interval(self.repeat_interval);
        self.repeat = Some(RepeatTimer { id, direction });
        log::debug!("repeat {direction:?} started (timer {id})");
    }

    /// End held-button stepping. Safe to call on every release path.
    pub fn stop_repeat(&mut self) {
        if let Some(timer) = self.repeat.take() {
            self.scheduler.cancel_interval(timer.id);
            log::debug!("repeat stopped (timer {})", timer.id);
        }
    }

    pub fn on_repeat_tick(&mut self, id: TimerId) {
        let Some(timer) = self.repeat else {
            return;
        };
        if timer.id != id {
            return;
        }
        self.jump_to(self.state.playhead as i64 + timer.direction.delta());
    }

    /// Start auto-play, restarting from the first point when already at the
    /// end. A no-op while playing.
    pub fn play(&mut self) {
        let Some(last) = self.timeline.last_index() else {
            return;
        };
        if self.state.is_playing {
            return;
        }
        self.stop_repeat();
        if self.state.playhead >= last {
            self.jump_to(0);
        }
        self.state.is_playing = true;
        self.generation = self.generation.wrapping_add(1);
        self.emit(PlaybackEvent::PlayStateChanged { is_playing: true });
        self.scheduler.request_frame(FrameToken(self.generation));
    }

    /// Clear the playing flag. A frame already queued sees the flag and
    /// does nothing.
    pub fn stop(&mut self) {
        if !self.state.is_playing {
            return;
        }
        self.state.is_playing = false;
        self.emit(PlaybackEvent::PlayStateChanged { is_playing: false });
    }

    pub fn on_frame(&mut self, token: FrameToken) {
        if !self.state.is_playing || token != FrameToken(self.generation) {
            return;
        }
        let Some(last) = self.timeline.last_index() else {
            return;
        };
        if self.state.playhead < last {
            self.state.playhead += 1;
            self.emit_position();
        }
        if self.state.playhead >= last {
            self.stop();
        } else {
            self.scheduler.request_frame(token);
        }
    }

    fn emit_position(&mut self) {
        let index = self.state.playhead;
        let Some(coordinate) = self.timeline.coordinate(index).copied() else {
            return;
        };
        let event = PlaybackEvent::PositionChanged(PositionChanged {
            index,
            coordinate,
            timestamp: self.timeline.timestamp(index),
            is_playing: self.state.is_playing,
        });
        self.emit(event);
    }

    fn emit(&mut self, event: PlaybackEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }
}
