//! Speed and acceleration model
//!
//! Two independent mechanisms:
//!
//! - [`SpeedCurve`]: `1 + min(e/d, 1)^p * M`, dividing visual phase lengths
//!   so channel cycling speeds up late in the session (video channels use
//!   the capped variant)
//! - [`AccelSchedule`]: stepped media playback rate, `+step` for every full
//!   `interval` elapsed past the acceleration start

/// Global speed multiplier curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedCurve {
    pub exponent: f64,
    pub max_mult: f64,
    pub video_cap: f64,
}

impl SpeedCurve {
    pub fn new(exponent: f64, max_mult: f64, video_cap: f64) -> Self {
        Self {
            exponent,
            max_mult,
            video_cap,
        }
    }

    /// Multiplier in `[1, 1 + max_mult]`
    pub fn multiplier(&self, elapsed: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return 1.0 + self.max_mult;
        }
        let t = (elapsed / duration).clamp(0.0, 1.0);
        1.0 + t.powf(self.exponent) * self.max_mult
    }

    /// Multiplier used for video-channel cycling, never above the cap
    pub fn video_multiplier(&self, elapsed: f64, duration: f64) -> f64 {
        self.multiplier(elapsed, duration).min(self.video_cap)
    }
}

/// Stepped playback-rate acceleration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelSchedule {
    /// Seconds from session start
    pub start: f64,
    pub interval: f64,
    pub step: f64,
}

impl AccelSchedule {
    // Absorbs float error so that e.g. 15.3 - 14.8 counts as one full step
    const EPSILON: f64 = 1e-9;

    pub fn new(start: f64, interval: f64, step: f64) -> Self {
        Self {
            start,
            interval,
            step,
        }
    }

    /// Completed steps at `elapsed` (0 before the start)
    pub fn steps(&self, elapsed: f64) -> u32 {
        if elapsed < self.start || self.interval <= 0.0 {
            return 0;
        }
        ((elapsed - self.start) / self.interval + Self::EPSILON).floor() as u32
    }

    pub fn rate_for(&self, steps: u32) -> f64 {
        1.0 + steps as f64 * self.step
    }

    pub fn rate(&self, elapsed: f64) -> f64 {
        self.rate_for(self.steps(elapsed))
    }
}

/// Tracks the applied step so the rate is pushed to media only on change
#[derive(Debug, Clone, PartialEq)]
pub struct AccelState {
    schedule: AccelSchedule,
    steps: u32,
    rate: f64,
}

impl AccelState {
    pub fn new(schedule: AccelSchedule) -> Self {
        Self {
            schedule,
            steps: 0,
            rate: 1.0,
        }
    }

    pub fn schedule(&self) -> &AccelSchedule {
        &self.schedule
    }

    /// Steps applied so far
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Current media playback rate
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Recompute for `elapsed`; returns the new rate when it changed
    pub fn update(&mut self, elapsed: f64) -> Option<f64> {
        if elapsed < self.schedule.start {
            return None;
        }
        let steps = self.schedule.steps(elapsed);
        if steps == self.steps {
            return None;
        }
        self.steps = steps;
        self.rate = self.schedule.rate_for(steps);
        Some(self.rate)
    }

    pub fn reset(&mut self) {
        self.steps = 0;
        self.rate = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> SpeedCurve {
        SpeedCurve::new(4.0, 18.0, 6.0)
    }

    #[test]
    fn test_multiplier_bounds_and_monotonic() {
        let c = curve();
        let duration = 24.0;
        let mut last = 0.0;
        for i in 0..=2400 {
            let e = i as f64 * 0.01;
            let m = c.multiplier(e, duration);
            assert!((1.0..=19.0).contains(&m));
            if e > 0.0 {
                assert!(m > last, "not increasing at {}", e);
            }
            last = m;
        }
        assert_eq!(c.multiplier(0.0, duration), 1.0);
        assert_eq!(c.multiplier(duration, duration), 19.0);
        assert_eq!(c.multiplier(duration * 3.0, duration), 19.0);
    }

    #[test]
    fn test_video_multiplier_capped() {
        let c = curve();
        for i in 0..=400 {
            let e = i as f64 * 0.1;
            assert!(c.video_multiplier(e, 20.0) <= 6.0);
        }
        // Global curve passes the cap well before the end
        assert!(c.multiplier(19.0, 20.0) > 6.0);
        assert_eq!(c.video_multiplier(19.0, 20.0), 6.0);
    }

    #[test]
    fn test_steps_after_start() {
        let s = AccelSchedule::new(20.0 * 0.74, 0.5, 0.05);
        assert_eq!(s.steps(14.0), 0);
        assert_eq!(s.steps(14.8), 0);
        assert_eq!(s.steps(15.29), 0);
        assert_eq!(s.steps(15.3), 1);
        assert_eq!(s.steps(15.8), 2);
        assert!((s.rate(15.3) - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_state_reports_changes_only() {
        let mut state = AccelState::new(AccelSchedule::new(10.0, 0.5, 0.05));
        assert_eq!(state.update(9.0), None);
        assert_eq!(state.update(10.2), None);
        let rate = state.update(10.5).unwrap();
        assert!((rate - 1.05).abs() < 1e-12);
        assert_eq!(state.update(10.7), None);
        assert_eq!(state.steps(), 1);

        state.reset();
        assert_eq!(state.rate(), 1.0);
    }
}
