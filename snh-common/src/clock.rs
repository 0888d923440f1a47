//! Clock abstraction and timestamp utilities
//!
//! Every playback session derives its elapsed time from one origin captured
//! at playback start. The origin and the "now" reading come from a [`Clock`]
//! so frame loops can run against wall time and tests against a manual clock.

use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Get current UTC timestamp (used for event timestamps)
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Monotonic time source in seconds
pub trait Clock {
    /// Seconds since an arbitrary, fixed origin
    fn now_secs(&self) -> f64;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock for tests and offline simulation
///
/// Clones share the same reading, so a test can keep one handle and pass
/// another to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the absolute reading
    pub fn set(&self, secs: f64) {
        self.secs.set(secs);
    }

    /// Advance the reading by `delta` seconds
    pub fn advance(&self, delta: f64) {
        self.secs.set(self.secs.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        self.secs.get()
    }
}
