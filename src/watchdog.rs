//! Per-state timeout protection against a hung plugin.
//!
//! Grounded on `engine/src/simulation_machine.hpp`'s `run_state_async`:
//! launches a state's work on a worker, polls it at a configured interval,
//! and on timeout either logs, aborts the run, or kills the process
//! outright. Rendered with `crossbeam_channel`'s `recv_timeout`/`select`
//! idiom in place of the original's `std::async`/`future::wait_for` polling
//! loop, matching how the teacher pack favors channels over futures for
//! cross-thread handoffs.

use crate::error;
use crate::{debug, error as log_error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What to do when a state's watchdog timeout is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchdogMode {
    /// Watchdog disabled entirely; states run synchronously on the driver
    /// thread with no timeout observed.
    Off,
    /// Log the overrun but let the state keep running.
    Log,
    /// Treat the overrun as an abort request for the next state transition.
    Abort,
    /// Terminate the process immediately; last resort for a truly hung
    /// plugin holding a lock the rest of the engine needs.
    Kill,
}

/// Per-state timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    pub mode: WatchdogMode,
    pub default_timeout: Duration,
    #[serde(default)]
    pub state_timeouts: HashMap<String, Duration>,
    pub polling_interval: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> WatchdogConfig {
        WatchdogConfig {
            mode: WatchdogMode::Off,
            default_timeout: Duration::from_secs(90),
            state_timeouts: HashMap::new(),
            polling_interval: Duration::from_millis(10),
        }
    }
}

impl WatchdogConfig {
    pub fn timeout_for(&self, state_name: &str) -> Duration {
        self.state_timeouts
            .get(state_name)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

/// The outcome of running a piece of work under watchdog supervision.
pub enum WatchdogOutcome<T> {
    /// The work finished within its timeout, producing `T`.
    Completed(T),
    /// The work exceeded its timeout; `mode` says what to do about it. In
    /// `Kill` mode the process has already terminated by the time this
    /// variant would be observed.
    TimedOut { mode: WatchdogMode },
}

/// Runs `work` on a worker thread, polling at `config.polling_interval`
/// until either it completes or `config.timeout_for(state_name)` elapses.
///
/// `work` must be `'static` since it executes on a detached thread; callers
/// typically move owned handles (channels, `Arc`s) into it rather than
/// borrowing `SimulationContext` directly.
pub fn run_watched<T, F>(
    state_name: &str,
    config: &WatchdogConfig,
    work: F,
) -> error::Result<WatchdogOutcome<T>>
where
    T: Send + 'static,
    F: FnOnce() -> error::Result<T> + Send + 'static,
{
    if config.mode == WatchdogMode::Off {
        return work().map(WatchdogOutcome::Completed);
    }

    let timeout = config.timeout_for(state_name);
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name(format!("state-{}", state_name))
        .spawn(move || {
            let _ = tx.send(work());
        })
        .expect("failed to spawn state worker thread");

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            match config.mode {
                WatchdogMode::Log => {
                    log_error!("state '{}' exceeded its watchdog timeout of {:?}", state_name, timeout);
                    // Keep waiting: logging mode never cancels the state.
                    match rx.recv() {
                        Ok(result) => return result.map(WatchdogOutcome::Completed),
                        Err(_) => {
                            return Ok(WatchdogOutcome::TimedOut {
                                mode: WatchdogMode::Log,
                            })
                        }
                    }
                }
                WatchdogMode::Abort => {
                    return Ok(WatchdogOutcome::TimedOut {
                        mode: WatchdogMode::Abort,
                    });
                }
                WatchdogMode::Kill => {
                    eprintln!(
                        "state '{}' exceeded its watchdog timeout of {:?}; terminating process",
                        state_name, timeout
                    );
                    std::process::abort();
                }
                WatchdogMode::Off => unreachable!("handled above"),
            }
        }
        let wait = remaining.min(config.polling_interval);
        match rx.recv_timeout(wait) {
            Ok(result) => return result.map(WatchdogOutcome::Completed),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                debug!("watchdog poll: state '{}' still running", state_name);
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                return error::err("watchdog worker thread disconnected without a result");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_within_timeout() {
        let config = WatchdogConfig {
            mode: WatchdogMode::Abort,
            default_timeout: Duration::from_secs(1),
            state_timeouts: HashMap::new(),
            polling_interval: Duration::from_millis(1),
        };
        let outcome = run_watched("test", &config, || Ok(42)).unwrap();
        match outcome {
            WatchdogOutcome::Completed(v) => assert_eq!(v, 42),
            WatchdogOutcome::TimedOut { .. } => panic!("should not time out"),
        }
    }

    #[test]
    fn off_mode_runs_synchronously_without_timeout() {
        let config = WatchdogConfig::default();
        let outcome = run_watched("test", &config, || Ok("done")).unwrap();
        match outcome {
            WatchdogOutcome::Completed(v) => assert_eq!(v, "done"),
            WatchdogOutcome::TimedOut { .. } => panic!("off mode never times out"),
        }
    }

    #[test]
    fn abort_mode_reports_timeout() {
        let config = WatchdogConfig {
            mode: WatchdogMode::Abort,
            default_timeout: Duration::from_millis(5),
            state_timeouts: HashMap::new(),
            polling_interval: Duration::from_millis(1),
        };
        let outcome = run_watched("slow", &config, || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .unwrap();
        match outcome {
            WatchdogOutcome::TimedOut { mode } => assert_eq!(mode, WatchdogMode::Abort),
            WatchdogOutcome::Completed(_) => panic!("expected a timeout"),
        }
    }
}
