//! The shared logical clock driving a simulation run.
//!
//! Grounded on `engine/src/simulation_sync.hpp`: a step counter, a fixed
//! step width, derived sim time, an optional ETA, the realtime factor
//! target, and the observed wall-clock cycle time. Rendered with the same
//! serde-derive-everything idiom the teacher pack uses for its config and
//! wire types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default step width: 20 milliseconds, matching the original engine's
/// `step_width_{20'000'000}` nanosecond default.
pub const DEFAULT_STEP_WIDTH: Duration = Duration::from_millis(20);

/// The engine's shared logical clock. Single writer: the driving thread.
/// Readers (the server, observers) must take the appropriate lock before
/// reading a borrowed `SimulationContext`'s copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationSync {
    step: u64,
    step_width: Duration,
    time: Duration,
    eta: Duration,
    cycle_time: Duration,
    realtime_factor: f64,
}

impl SimulationSync {
    pub fn new(step_width: Duration) -> SimulationSync {
        assert!(step_width > Duration::from_secs(0), "step_width must be > 0");
        SimulationSync {
            step: 0,
            step_width,
            time: Duration::from_secs(0),
            eta: Duration::from_secs(0),
            cycle_time: Duration::from_secs(0),
            realtime_factor: 1.0,
        }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn step_width(&self) -> Duration {
        self.step_width
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    /// `0` means "no configured ETA".
    pub fn eta(&self) -> Duration {
        self.eta
    }

    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    /// `<= 0.0` means "unlimited", i.e. pacing is disabled.
    pub fn realtime_factor(&self) -> f64 {
        self.realtime_factor
    }

    /// Advances `step` by one and `time` by `step_width`, preserving the
    /// invariant `time == step * step_width`.
    pub fn increment_step(&mut self) {
        self.step += 1;
        self.time += self.step_width;
    }

    pub fn set_realtime_factor(&mut self, rtf: f64) {
        self.realtime_factor = rtf;
    }

    pub fn set_eta(&mut self, eta: Duration) {
        self.eta = eta;
    }

    pub fn set_cycle_time(&mut self, cycle_time: Duration) {
        self.cycle_time = cycle_time;
    }

    /// The realtime factor actually achieved this cycle, or `None` if the
    /// cycle time was zero (e.g. before the first step).
    pub fn achievable_realtime_factor(&self) -> Option<f64> {
        if self.cycle_time.as_secs_f64() <= 0.0 {
            None
        } else {
            Some(self.step_width.as_secs_f64() / self.cycle_time.as_secs_f64())
        }
    }

    /// The real-time pacing target for one cycle: `step_width / rtf`, or
    /// `None` when pacing is disabled (`realtime_factor <= 0`).
    pub fn pacing_target(&self) -> Option<Duration> {
        if self.realtime_factor <= 0.0 {
            None
        } else {
            Some(Duration::from_secs_f64(
                self.step_width.as_secs_f64() / self.realtime_factor,
            ))
        }
    }

    /// Resets step, time, and cycle_time to zero, keeping step_width, eta,
    /// and realtime_factor as configured. Used by the RESET state, which
    /// does not reconstruct the Stack.
    pub fn reset(&mut self) {
        self.step = 0;
        self.time = Duration::from_secs(0);
        self.cycle_time = Duration::from_secs(0);
    }
}

impl Default for SimulationSync {
    fn default() -> SimulationSync {
        SimulationSync::new(DEFAULT_STEP_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_step_preserves_time_invariant() {
        let mut sync = SimulationSync::new(Duration::from_millis(20));
        for n in 1..=50u64 {
            sync.increment_step();
            assert_eq!(sync.step(), n);
            assert_eq!(sync.time(), sync.step_width() * n as u32);
        }
    }

    #[test]
    fn non_positive_realtime_factor_disables_pacing() {
        let mut sync = SimulationSync::default();
        sync.set_realtime_factor(0.0);
        assert_eq!(sync.pacing_target(), None);
        sync.set_realtime_factor(-1.0);
        assert_eq!(sync.pacing_target(), None);
        sync.set_realtime_factor(2.0);
        assert_eq!(sync.pacing_target(), Some(sync.step_width() / 2));
    }

    #[test]
    fn reset_clears_step_and_time_but_keeps_step_width() {
        let mut sync = SimulationSync::new(Duration::from_millis(20));
        sync.increment_step();
        sync.increment_step();
        sync.set_cycle_time(Duration::from_millis(5));
        sync.reset();
        assert_eq!(sync.step(), 0);
        assert_eq!(sync.time(), Duration::from_secs(0));
        assert_eq!(sync.cycle_time(), Duration::from_secs(0));
        assert_eq!(sync.step_width(), Duration::from_millis(20));
    }
}
