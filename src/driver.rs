//! Animation driver.
//!
//! One frame callback advances the simulation one tick and renders, then
//! re-arms itself through a [`FrameScheduler`]. The scheduler is a trait so
//! the loop runs the same against a window's redraw requests and against a
//! manual scheduler in tests.

use crate::time::FrameClock;

/// Source of frame callbacks.
pub trait FrameScheduler {
    /// Ask for one more frame callback.
    fn request_frame(&mut self);

    /// Drop any pending request. Must be safe to call repeatedly.
    fn cancel(&mut self);
}

/// Scheduler driven by hand: a request sets a flag, the owner polls it.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    pending: bool,
    requests: u64,
    cancels: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the pending request, if any.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn cancels(&self) -> u64 {
        self.cancels
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) {
        self.pending = true;
        self.requests += 1;
    }

    fn cancel(&mut self) {
        self.pending = false;
        self.cancels += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Stopped,
    Running,
}

/// Sequences tick + render once per frame callback.
#[derive(Debug)]
pub struct AnimationDriver<S: FrameScheduler> {
    scheduler: S,
    clock: FrameClock,
    state: DriverState,
}

impl<S: FrameScheduler> AnimationDriver<S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_clock(scheduler, FrameClock::new())
    }

    pub fn with_clock(scheduler: S, clock: FrameClock) -> Self {
        Self {
            scheduler,
            clock,
            state: DriverState::Stopped,
        }
    }

    /// Start the loop by requesting the first frame. No-op when running.
    pub fn start(&mut self) {
        if self.state == DriverState::Running {
            return;
        }
        self.state = DriverState::Running;
        self.scheduler.request_frame();
        tracing::debug!("animation driver started");
    }

    /// Stop requesting frames. Idempotent.
    pub fn stop(&mut self) {
        self.scheduler.cancel();
        if self.state == DriverState::Running {
            self.state = DriverState::Stopped;
            tracing::debug!("animation driver stopped");
        }
    }

    /// Run one frame callback. `frame` receives the frame timestamp in ms.
    /// Returns false, without calling `frame`, when stopped.
    pub fn tick<F>(&mut self, frame: F) -> bool
    where
        F: FnOnce(f64),
    {
        if self.state != DriverState::Running {
            return false;
        }
        let timestamp_ms = self.clock.update();
        frame(timestamp_ms);
        self.scheduler.request_frame();
        true
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Restart the clock from zero, as for a fresh animation.
    pub fn reset_clock(&mut self) {
        self.clock.reset();
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}
