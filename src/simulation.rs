//! The top-level entry point: validates a `Stack`, builds its
//! `SimulationContext`, wires the OS signal watcher into the context's
//! interrupt slot, drives the whole thing through the `StateMachine`, and
//! optionally writes its output files (spec §4.5 end to end, §5 "Resource
//! discipline", §6 "Output files").
//!
//! Grounded on `dqcsim/src/host/simulation.rs`'s role as the one aggregate
//! a CLI front-end constructs and drives start to finish; the watchdog and
//! interrupt wiring themselves are this crate's own (see `state_machine`'s
//! module doc for why model calls never run under the context's own lock).

use crate::config::Stack;
use crate::context::{Outcome, SimulationContext};
use crate::driver::{Driver, NullDriver};
use crate::error::Result;
use crate::interrupt::Interrupt;
use crate::output::{self, OutputConfig};
use crate::state_machine::StateMachine;
use crate::util::signal;
use crate::{error, note};

/// Flags controlling one `run`/`probe` invocation, mirroring the CLI `run`
/// subcommand's own flags (spec §6).
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// `--allow-empty`: skip `Stack::validate`, permitting a run with no
    /// simulators/vehicles/controllers configured.
    pub allow_empty: bool,
    /// `--write-output`/`--no-write-output`.
    pub write_output: bool,
    /// `--require-success`/`--no-require-success`: remap a `Stopped`
    /// outcome to `Failure` (spec §6 "Exit codes").
    pub require_success: bool,
    /// `--uuid U`: overrides the freshly generated run UUID, e.g. to pin
    /// the `registry/<uuid>/` output path across a reproduction.
    pub uuid: Option<uuid::Uuid>,
}

impl Default for RunOptions {
    fn default() -> RunOptions {
        RunOptions {
            allow_empty: false,
            write_output: true,
            require_success: false,
            uuid: None,
        }
    }
}

/// The result of one completed `Simulation::run`: the concluded context
/// (for callers that want its report/statistics directly) and the exit
/// code its outcome maps to (spec §6 "Exit codes").
pub struct RunReport {
    pub ctx: SimulationContext,
    pub exit_code: i32,
}

/// A single simulation run, from a validated Stack to a concluded context.
pub struct Simulation {
    stack: Stack,
    driver: Box<dyn Driver>,
}

impl Simulation {
    /// Builds a `Simulation` with no scripting driver attached.
    pub fn new(stack: Stack) -> Simulation {
        Simulation {
            stack,
            driver: Box::new(NullDriver::new()),
        }
    }

    pub fn with_driver(stack: Stack, driver: Box<dyn Driver>) -> Simulation {
        Simulation { stack, driver }
    }

    /// Validates the Stack (unless `allow_empty`), builds the context,
    /// installs the abort-on-signal watcher, and runs the full CONNECT
    /// through DISCONNECT state machine. Writes `registry/<uuid>/`'s output
    /// files afterward unless suppressed.
    pub fn run(self, options: &RunOptions) -> Result<RunReport> {
        let Simulation { stack, driver } = self;

        if !options.allow_empty {
            stack.validate()?;
        }

        let mut ctx = SimulationContext::build(&stack, driver)?;
        if let Some(uuid) = options.uuid {
            ctx.id = uuid;
        }
        let interrupts = ctx.interrupts.clone();
        signal::spawn_abort_watcher(move || {
            interrupts.set(Interrupt::Abort("signal received".to_owned()));
        })?;

        note!("starting simulation {}", ctx.id);
        let machine = StateMachine::new(stack.engine.clone());
        let mut ctx = machine.run(ctx)?;

        if options.require_success {
            if let Some(Outcome::Stopped) = ctx.outcome {
                ctx.outcome = Some(Outcome::Failure {
                    reason: "run stopped rather than succeeded, and --require-success was set"
                        .to_owned(),
                });
            }
        }

        let exit_code = ctx.outcome.as_ref().map(Outcome::exit_code).unwrap_or(1);
        if exit_code != 0 {
            error!("simulation {} concluded with exit code {}", ctx.id, exit_code);
        } else {
            note!("simulation {} concluded successfully", ctx.id);
        }

        if options.write_output {
            let output_config = OutputConfig::for_run(&ctx.id);
            output::write_outputs(&output_config, &stack, &ctx)?;
        }

        Ok(RunReport { ctx, exit_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::Conf;

    /// A model-free stack (`validate()` would reject it) with a `start`
    /// event wired straight to `succeed`, matching the CONNECT/STEP_BEGIN
    /// tests already exercised in `state_machine`.
    fn seeded_empty_stack() -> Stack {
        let mut stack = Stack::new();
        stack.triggers.push(Conf::new(serde_json::json!({
            "event": "start",
            "action": "succeed",
        })));
        stack
    }

    #[test]
    fn run_without_models_requires_allow_empty() {
        let stack = seeded_empty_stack();
        let options = RunOptions {
            write_output: false,
            ..RunOptions::default()
        };
        let sim = Simulation::new(stack);
        assert!(sim.run(&options).is_err());
    }

    #[test]
    fn allow_empty_runs_to_success() {
        let stack = seeded_empty_stack();
        let options = RunOptions {
            allow_empty: true,
            write_output: false,
            ..RunOptions::default()
        };
        let sim = Simulation::new(stack);
        let report = sim.run(&options).unwrap();
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.ctx.outcome, Some(Outcome::Success));
    }

    #[test]
    fn require_success_remaps_stopped_to_failure() {
        let mut stack = Stack::new();
        stack.triggers.push(Conf::new(serde_json::json!({
            "event": "start",
            "action": "stop",
        })));
        let options = RunOptions {
            allow_empty: true,
            write_output: false,
            require_success: true,
            uuid: None,
        };
        let sim = Simulation::new(stack);
        let report = sim.run(&options).unwrap();
        assert_eq!(report.exit_code, 9);
        assert!(matches!(report.ctx.outcome, Some(Outcome::Failure { .. })));
    }
}
