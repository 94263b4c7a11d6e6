//! End-to-end scenarios driving the full CONNECT-through-DISCONNECT state
//! machine against small, self-contained stacks, exercising the engine's
//! own built-in `"nop"` simulator/controller rather than a real plugin
//! file (spec §8's scenario list).

use cloe::conf::{Conf, ConfReader, FileConfReader};
use cloe::config::Stack;
use cloe::context::Outcome;
use cloe::model::{Model, ModelKind, Registrar};
use cloe::plugin::Plugin;
use cloe::simulation::{RunOptions, Simulation};
use serde_json::json;
use std::time::Duration;

fn stack_from_json(value: serde_json::Value) -> Stack {
    let mut stack = Stack::new();
    let reader = FileConfReader::new(false, false);
    stack.from_conf(Conf::new(value), 0, &reader).unwrap();
    stack
}

fn run_options() -> RunOptions {
    RunOptions {
        write_output: false,
        ..RunOptions::default()
    }
}

#[test]
fn empty_run_succeeds_via_built_in_nop_plugins() {
    let stack = stack_from_json(json!({
        "version": "4.1",
        "simulators": [{"binding": "nop"}],
        "vehicles": [{"name": "v", "from": {"simulator": "nop", "index": 0}}],
        "controllers": [{"binding": "nop", "vehicle": "v"}],
        "triggers": [{"event": "start", "action": "succeed"}],
        "simulation": {"model_step_width": 20_000_000u64},
    }));

    let report = Simulation::new(stack).run(&run_options()).unwrap();

    assert_eq!(report.exit_code, 0);
    assert_eq!(report.ctx.outcome, Some(Outcome::Success));
    assert!(report.ctx.sync.step() >= 1);
    let history = report.ctx.coordinator.history();
    assert!(history.iter().any(|t| t.action == "succeed"));
}

#[test]
fn time_bounded_trigger_stops_the_run() {
    let stack = stack_from_json(json!({
        "version": "4.1",
        "simulators": [{"binding": "nop"}],
        "vehicles": [{"name": "v", "from": {"simulator": "nop", "index": 0}}],
        "controllers": [{"binding": "nop", "vehicle": "v"}],
        "triggers": [{"event": "time=1.0", "action": "stop"}],
        "simulation": {"model_step_width": 20_000_000u64},
    }));
    let step_width = stack.simulation.model_step_width;

    let report = Simulation::new(stack).run(&run_options()).unwrap();

    assert_eq!(report.exit_code, 8);
    assert_eq!(report.ctx.outcome, Some(Outcome::Stopped));
    let time = report.ctx.sync.time();
    assert!(time >= Duration::from_secs_f64(1.0));
    assert!(time < Duration::from_secs_f64(1.0) + step_width);
}

#[test]
fn require_success_remaps_stop_to_failure_exit_code() {
    let stack = stack_from_json(json!({
        "version": "4.1",
        "simulators": [{"binding": "nop"}],
        "vehicles": [{"name": "v", "from": {"simulator": "nop", "index": 0}}],
        "controllers": [{"binding": "nop", "vehicle": "v"}],
        "triggers": [{"event": "start", "action": "stop"}],
        "simulation": {"model_step_width": 20_000_000u64},
    }));

    let options = RunOptions {
        write_output: false,
        require_success: true,
        ..RunOptions::default()
    };
    let report = Simulation::new(stack).run(&options).unwrap();

    assert_eq!(report.exit_code, 9);
    assert!(matches!(report.ctx.outcome, Some(Outcome::Failure { .. })));
}

#[test]
fn version_mismatch_is_rejected_before_any_model_is_touched() {
    let mut stack = Stack::new();
    let reader = FileConfReader::new(false, false);
    let err = stack
        .from_conf(Conf::new(json!({"version": "3"})), 0, &reader)
        .unwrap_err();
    assert!(err.to_string().contains("require version 4.1"));
    assert!(stack.simulators.is_empty());
}

#[test]
fn include_cycle_is_rejected_at_the_recursion_limit() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");
    std::fs::write(&a, r#"{"version": "4.1", "include": ["b.json"]}"#).unwrap();
    std::fs::write(&b, r#"{"version": "4.1", "include": ["a.json"]}"#).unwrap();

    let reader = FileConfReader::new(false, false);
    let mut stack = Stack::new();
    let conf = reader.read(&a, None).unwrap();
    let err = stack.from_conf(conf, 0, &reader).unwrap_err();

    assert!(err.to_string().contains("maximum include recursion depth reached: 64"));
    assert!(err.to_string().contains("/include"));
}

#[test]
fn from_conf_replayed_over_its_own_input_config_reproduces_an_equal_stack() {
    let original = stack_from_json(json!({
        "version": "4.1",
        "simulators": [{"binding": "nop"}],
        "vehicles": [{"name": "v", "from": {"simulator": "nop", "index": 0}}],
        "controllers": [{"binding": "nop", "vehicle": "v"}],
        "triggers": [{"event": "start", "action": "succeed"}],
        "simulation": {"model_step_width": 20_000_000u64},
    }));

    let reader = FileConfReader::new(false, false);
    let mut replayed = Stack::new();
    for layer in original.input_config() {
        replayed.from_conf(layer.clone(), 0, &reader).unwrap();
    }

    assert_eq!(original.active_config(), replayed.active_config());
}

#[test]
fn probe_yields_a_probing_outcome_without_running_a_cycle() {
    let mut stack = stack_from_json(json!({
        "version": "4.1",
        "simulators": [{"binding": "nop"}],
        "vehicles": [{"name": "v", "from": {"simulator": "nop", "index": 0}}],
        "controllers": [{"binding": "nop", "vehicle": "v"}],
        "triggers": [{"event": "start", "action": "succeed"}],
        "simulation": {"model_step_width": 20_000_000u64},
    }));
    stack.engine.probe_simulation = true;

    let report = Simulation::new(stack).run(&run_options()).unwrap();

    assert_eq!(report.exit_code, 0);
    assert_eq!(report.ctx.outcome, Some(Outcome::Probing));
    let probe = report.ctx.probe_report.expect("probe run must produce a report");
    for key in ["uuid", "plugins", "vehicles", "trigger_actions", "trigger_events", "http_endpoints", "signals"] {
        assert!(probe.get(key).is_some(), "probe report missing '{}'", key);
    }
    assert_eq!(probe["plugins"]["nop"], json!("<in-process:nop>"));
}

/// A controller stand-in that reports a sim-time one step behind every
/// cycle, used to exercise the STEP_CONTROLLERS retry/abort-or-remove
/// policy (spec §4.5, §8 scenario 5) without waiting out the spec's full
/// 1000-retry default.
/// `disconnected` is shared with the test so it can observe that
/// `disconnect` ran even on the "removed mid-run" exit path (spec §8
/// universal invariant: every connected model is disconnected regardless
/// of outcome).
struct StallingController {
    connected: bool,
    operational: bool,
    disconnected: std::sync::Arc<std::sync::Mutex<bool>>,
}

impl Model for StallingController {
    fn name(&self) -> &str {
        "stall"
    }
    fn connect(&mut self) -> cloe::Result<()> {
        self.connected = true;
        Ok(())
    }
    fn enroll(&mut self, _registrar: &mut Registrar) -> cloe::Result<()> {
        Ok(())
    }
    fn start(&mut self, _sync: &cloe::sync::SimulationSync) -> cloe::Result<()> {
        self.operational = true;
        Ok(())
    }
    fn process(&mut self, sync: &cloe::sync::SimulationSync) -> cloe::Result<Duration> {
        Ok(sync.time().saturating_sub(sync.step_width()))
    }
    fn stop(&mut self, _sync: &cloe::sync::SimulationSync) -> cloe::Result<()> {
        self.operational = false;
        Ok(())
    }
    fn disconnect(&mut self) -> cloe::Result<()> {
        self.connected = false;
        *self.disconnected.lock().unwrap() = true;
        Ok(())
    }
    fn is_connected(&self) -> bool {
        self.connected
    }
    fn is_operational(&self) -> bool {
        self.operational
    }
}

fn stack_with_stalling_controller(
    abort_on_controller_failure: bool,
) -> (Stack, std::sync::Arc<std::sync::Mutex<bool>>) {
    let mut stack = stack_from_json(json!({
        "version": "4.1",
        "simulators": [{"binding": "nop"}],
        "vehicles": [{"name": "v", "from": {"simulator": "nop", "index": 0}}],
        "controllers": [{"binding": "stall"}],
        "triggers": [{"event": "time=0.5", "action": "stop"}],
        "simulation": {"model_step_width": 20_000_000u64},
    }));
    let disconnected = std::sync::Arc::new(std::sync::Mutex::new(false));
    let disconnected_for_factory = disconnected.clone();
    stack.plugin_registry_mut().register_builtin(Plugin::in_process(
        "stall",
        ModelKind::Controller,
        Box::new(move || {
            Ok(Box::new(StallingController {
                connected: false,
                operational: false,
                disconnected: disconnected_for_factory.clone(),
            }) as Box<dyn Model>)
        }),
    ));
    stack.engine.controller_retry_limit = 2;
    stack.engine.controller_retry_sleep = Duration::from_millis(1);
    stack.engine.abort_on_controller_failure = abort_on_controller_failure;
    (stack, disconnected)
}

#[test]
fn stalling_controller_aborts_the_run_when_configured_to() {
    let (stack, disconnected) = stack_with_stalling_controller(true);
    let report = Simulation::new(stack).run(&run_options()).unwrap();
    assert_eq!(report.exit_code, 16);
    match report.ctx.outcome {
        Some(Outcome::Aborted { reason }) => assert!(reason.contains("not progressing")),
        other => panic!("expected Aborted, got {:?}", other),
    }
    assert!(*disconnected.lock().unwrap(), "aborted controller must still be disconnected");
}

#[test]
fn stalling_controller_is_dropped_and_the_run_continues_when_not_aborting() {
    let (stack, disconnected) = stack_with_stalling_controller(false);
    let report = Simulation::new(stack).run(&run_options()).unwrap();
    assert_eq!(report.exit_code, 8);
    assert_eq!(report.ctx.outcome, Some(Outcome::Stopped));
    assert!(report.ctx.models.controllers.is_empty());
    assert!(
        *disconnected.lock().unwrap(),
        "controller removed mid-run for exceeding its retry limit must still be disconnected"
    );
}
