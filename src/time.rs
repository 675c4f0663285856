//! Frame timing.
//!
//! [`FrameClock`] is the timestamp source for the animation loop: the spawn
//! scheduler reads its elapsed milliseconds, the window title reads its FPS.
//!
//! # Example
//!
//! ```
//! use screenprint::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//! let now_ms = clock.update();
//! assert!(now_ms >= 0.0);
//! assert_eq!(clock.frame(), 1);
//! ```

use std::time::{Duration, Instant};

/// Elapsed time, frame count and FPS for the animation loop.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    elapsed_ms: f64,
    delta_ms: f64,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
    /// Fixed per-frame step in ms, for deterministic runs.
    fixed_step_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            elapsed_ms: 0.0,
            delta_ms: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
            fixed_step_ms: None,
        }
    }

    /// A clock that advances by exactly `step_ms` per update, ignoring the
    /// wall clock. The first update reads 0.
    pub fn fixed(step_ms: f64) -> Self {
        Self {
            fixed_step_ms: Some(step_ms.max(0.0)),
            ..Self::new()
        }
    }

    /// Advance one frame. Returns the frame timestamp in ms since start.
    pub fn update(&mut self) -> f64 {
        let now = Instant::now();

        match self.fixed_step_ms {
            Some(step) => {
                self.delta_ms = if self.frame_count == 0 { 0.0 } else { step };
                self.elapsed_ms += self.delta_ms;
            }
            None => {
                self.delta_ms = now.duration_since(self.last_frame).as_secs_f64() * 1000.0;
                self.elapsed_ms = now.duration_since(self.start).as_secs_f64() * 1000.0;
            }
        }
        self.last_frame = now;
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        self.elapsed_ms
    }

    /// Timestamp of the last update, ms since start.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Time between the last two updates in ms.
    #[inline]
    pub fn delta_ms(&self) -> f64 {
        self.delta_ms
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second, refreshed twice a second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Restart from zero. Used when the animation restarts.
    pub fn reset(&mut self) {
        *self = Self {
            fixed_step_ms: self.fixed_step_ms,
            ..Self::new()
        };
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
