//! Frame clock for the demo loop.
//!
//! Produces the `dt` handed to [`FlockEngine::step`](crate::FlockEngine::step).
//! Pausing is expressed by the caller skipping `step` while
//! [`FrameClock::is_paused`] is true; the clock just stops advancing.

use std::time::{Duration, Instant};

/// Longest step the clock will report, so a stalled window does not launch the flock.
pub const MAX_DELTA: f32 = 1.0 / 15.0;

#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frames: u64,
    fps_since: Instant,
    fps_interval: Duration,
    paused: bool,
    fixed_delta: Option<f32>,
    max_delta: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frames: 0,
            fps_since: now,
            fps_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            max_delta: MAX_DELTA,
        }
    }

    /// Advance to now and return the step length in seconds (0 while paused).
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        if self.paused {
            self.delta_secs = 0.0;
            return 0.0;
        }

        let raw = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.delta_secs = self.fixed_delta.unwrap_or(raw).min(self.max_delta);
        self.frame_count += 1;

        let window = now.duration_since(self.fps_since);
        if window >= self.fps_interval {
            self.fps = (self.frame_count - self.fps_frames) as f32 / window.as_secs_f32();
            self.fps_frames = self.frame_count;
            self.fps_since = now;
            log::trace!("{:.1} fps", self.fps);
        }

        self.delta_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Ticks taken while running.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused && !paused {
            // Time spent paused must not show up as one giant step.
            self.last_tick = Instant::now();
        }
        self.paused = paused;
    }

    pub fn toggle_pause(&mut self) {
        self.set_paused(!self.paused);
    }

    /// Report `delta` every tick instead of wall time. `None` restores wall time.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }

    pub fn set_max_delta(&mut self, max_delta: f32) {
        self.max_delta = max_delta.max(0.0);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
