//! Initialization/execution progress reporting, gated so that it does not
//! spam observers: a report is due only once progress has advanced by at
//! least 10% or 10 seconds have elapsed since the last one.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const MIN_PERCENT_STEP: f64 = 10.0;
const MIN_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// One phase of progress (initialization or execution): a `[beg, end)` range
/// with a current percentage and an optional ETA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub beg: f64,
    pub end: f64,
    pub cur_percent: f64,
    pub eta: Duration,
}

impl Phase {
    pub fn new(beg: f64, end: f64) -> Phase {
        Phase {
            beg,
            end,
            cur_percent: 0.0,
            eta: Duration::from_secs(0),
        }
    }
}

/// Progress across the two phases of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationProgress {
    pub initialization: Phase,
    pub execution: Phase,
    #[serde(skip)]
    last_reported_percent: f64,
    #[serde(skip)]
    last_report_at: Option<Instant>,
}

impl SimulationProgress {
    pub fn new() -> SimulationProgress {
        SimulationProgress {
            initialization: Phase::new(0.0, 100.0),
            execution: Phase::new(0.0, 100.0),
            last_reported_percent: -1.0,
            last_report_at: None,
        }
    }

    /// Updates the execution phase's current percentage and ETA, returning
    /// `true` if a report is due (≥10% advanced or ≥10s elapsed).
    pub fn update_execution(&mut self, cur_percent: f64, eta: Duration) -> bool {
        self.execution.cur_percent = cur_percent;
        self.execution.eta = eta;
        self.is_report_due(cur_percent)
    }

    fn is_report_due(&mut self, cur_percent: f64) -> bool {
        let now = Instant::now();
        let percent_advanced = (cur_percent - self.last_reported_percent).abs() >= MIN_PERCENT_STEP;
        let time_elapsed = match self.last_report_at {
            None => true,
            Some(last) => now.duration_since(last) >= MIN_REPORT_INTERVAL,
        };
        if percent_advanced || time_elapsed {
            self.last_reported_percent = cur_percent;
            self.last_report_at = Some(now);
            true
        } else {
            false
        }
    }
}

impl Default for SimulationProgress {
    fn default() -> SimulationProgress {
        SimulationProgress::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_is_always_reported() {
        let mut progress = SimulationProgress::new();
        assert!(progress.update_execution(1.0, Duration::from_secs(0)));
    }

    #[test]
    fn small_advance_within_window_is_not_reported() {
        let mut progress = SimulationProgress::new();
        assert!(progress.update_execution(5.0, Duration::from_secs(0)));
        assert!(!progress.update_execution(8.0, Duration::from_secs(0)));
    }

    #[test]
    fn large_advance_is_reported() {
        let mut progress = SimulationProgress::new();
        assert!(progress.update_execution(5.0, Duration::from_secs(0)));
        assert!(progress.update_execution(20.0, Duration::from_secs(0)));
    }
}
