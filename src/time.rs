//! Frame clock feeding [`Controller::tick`](crate::Controller::tick).
//!
//! # Example
//!
//! ```ignore
//! let mut clock = FrameClock::new();
//!
//! loop {
//!     let dt = clock.tick();
//!     for event in controller.tick(dt) { /* ... */ }
//! }
//! ```
//!
//! Deltas are clamped to [`FrameClock::max_delta`] so a stalled frame (window
//! dragged, laptop lid closed) cannot jump a transition straight to its end.

use std::time::{Duration, Instant};

/// Default upper bound on a single frame's delta, in seconds.
pub const DEFAULT_MAX_DELTA: f32 = 0.1;

/// Produces one delta time per frame.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    /// Sum of all deltas handed out.
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    paused: bool,
    /// Replaces measured time when set.
    fixed_delta: Option<f32>,
    max_delta: f32,
    time_scale: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            paused: false,
            fixed_delta: None,
            max_delta: DEFAULT_MAX_DELTA,
            time_scale: 1.0,
        }
    }

    /// Clock that always yields `delta`, for headless runs and tests.
    pub fn fixed(delta: f32) -> Self {
        let mut clock = Self::new();
        clock.fixed_delta = Some(delta.max(0.0));
        clock
    }

    /// Start a new frame and return its delta in seconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let measured = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.paused {
            self.delta_secs = 0.0;
            return 0.0;
        }

        let raw = self.fixed_delta.unwrap_or(measured.min(self.max_delta));
        self.delta_secs = raw * self.time_scale;
        self.elapsed_secs += self.delta_secs;
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        self.delta_secs
    }

    /// Sum of all deltas so far.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

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

    #[inline]
    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    /// While paused, `tick` returns 0.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.last_frame = Instant::now();
            self.paused = false;
        }
    }

    pub fn set_max_delta(&mut self, max_delta: f32) {
        self.max_delta = max_delta.max(0.0);
    }

    /// `1.0` is real time; negative values clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fixed_clock() {
        let mut clock = FrameClock::fixed(1.0 / 60.0);
        for _ in 0..60 {
            clock.tick();
        }
        assert_eq!(clock.frame(), 60);
        assert!((clock.elapsed() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut clock = FrameClock::new();
        clock.set_max_delta(0.005);
        thread::sleep(Duration::from_millis(20));
        assert!(clock.tick() <= 0.005);
    }

    #[test]
    fn test_pause() {
        let mut clock = FrameClock::fixed(0.1);
        clock.tick();
        clock.pause();
        assert_eq!(clock.tick(), 0.0);
        assert!((clock.elapsed() - 0.1).abs() < 1e-6);
        clock.resume();
        assert!((clock.tick() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_time_scale() {
        let mut clock = FrameClock::fixed(0.1);
        clock.set_time_scale(0.5);
        assert!((clock.tick() - 0.05).abs() < 1e-6);
        clock.set_time_scale(-1.0);
        assert_eq!(clock.tick(), 0.0);
    }
}
