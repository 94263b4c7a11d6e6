//! `SimulationContext`: everything one run of the state machine needs,
//! bundled so it can be handed wholesale to a watchdog worker thread for the
//! duration of one state and handed back (spec §3 "SimulationContext",
//! §4.6).
//!
//! Grounded on `dqcsim/src/host/simulation.rs`'s `Simulation` struct, which
//! plays the same role: one aggregate owning the plugin/model handles, the
//! clock, and the bookkeeping needed to run and later reproduce a session.

use crate::conf::Conf;
use crate::config::{Stack, VehicleSource};
use crate::coordinator::Coordinator;
use crate::driver::Driver;
use crate::error::{inv_op, model_err, Result};
use crate::interrupt::InterruptSlot;
use crate::model::{self, ModelKind, ModelRegistry, Vehicle};
use crate::progress::SimulationProgress;
use crate::statistics::SimulationStatistics;
use crate::sync::SimulationSync;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How a run concluded. Recorded once, at SUCCESS/FAIL/STOP/ABORT/PROBE, and
/// carried into the final result record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { reason: String },
    Stopped,
    Aborted { reason: String },
    NoStart { reason: String },
    Probing,
}

impl Outcome {
    /// The base exit code, before a `--require-success` CLI flag remaps
    /// Stopped to Failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Probing => 0,
            Outcome::Stopped => 8,
            Outcome::Failure { .. } => 9,
            Outcome::Aborted { .. } => 16,
            Outcome::NoStart { .. } => 4,
        }
    }
}

/// Everything one simulation run needs, in one `Send` bundle.
pub struct SimulationContext {
    pub id: Uuid,
    pub sync: SimulationSync,
    pub progress: SimulationProgress,
    pub statistics: SimulationStatistics,
    pub models: ModelRegistry,
    /// Binding name to canonical plugin path, for every simulator,
    /// controller, and component resolved during `build` (spec §6 "probe"
    /// report's `plugins` field).
    pub plugins: HashMap<String, String>,
    pub coordinator: Coordinator,
    pub driver: Box<dyn Driver>,
    /// The single-slot interrupt handoff the state machine polls between
    /// states, and that engine-provided trigger actions and the OS signal
    /// watcher feed (spec §9 "Interrupts").
    pub interrupts: Arc<InterruptSlot>,
    /// Set and cleared by the PAUSE/RESUME off-path transitions; consulted
    /// by the nominal flow's own state functions (spec §4.5: "PAUSE if
    /// paused").
    pub pause_requested: bool,
    pub outcome: Option<Outcome>,
    /// Free-form metadata collected by the PROBE state, present only for a
    /// probing run.
    pub probe_report: Option<Value>,
    /// Raw `triggers[]` entries from the Stack, queued onto the coordinator
    /// once during START, after every event/action factory has enrolled.
    pub seed_triggers: Vec<Conf>,
    /// Set by CONNECT when an ABORT transition originates there (a model
    /// failed to connect), so ABORT can record `Outcome::NoStart` instead
    /// of `Outcome::Aborted`.
    pub abort_from_connect: bool,
    last_cycle_start: Option<Instant>,
    /// Vehicle/controller names the `/simulation` block singled out for
    /// this run, or empty for "all configured".
    pub active_vehicles: Vec<String>,
    pub active_controllers: Vec<String>,
    /// Controller retry bookkeeping: consecutive failures per instance
    /// name, reset on success (spec §4.5 STEP_CONTROLLERS).
    controller_retries: HashMap<String, u32>,
}

impl SimulationContext {
    /// Builds a context from a validated `Stack`: resolves every
    /// simulator/vehicle/controller/component to a plugin factory and
    /// constructs (but does not yet `connect`) each model.
    pub fn build(stack: &Stack, driver: Box<dyn Driver>) -> Result<SimulationContext> {
        let mut models = ModelRegistry::new();
        let mut plugins = HashMap::new();

        for sim in &stack.simulators {
            let plugin = stack
                .plugin_registry()
                .get_for_kind(&sim.binding, ModelKind::Simulator)
                .ok_or_else(|| {
                    model_err::<()>(format!("no plugin registered for binding '{}'", sim.binding))
                        .unwrap_err()
                })?;
            if plugin.kind != ModelKind::Simulator {
                return inv_op(format!(
                    "binding '{}' is a {}, not a simulator",
                    sim.binding, plugin.kind
                ));
            }
            plugins.insert(sim.binding.clone(), plugin.canonical_path.display().to_string());
            let instance = (plugin.factory)()?;
            models
                .simulators
                .insert(sim.instance_name().to_owned(), model::handle(instance));
        }

        for ctrl in &stack.controllers {
            let plugin = stack
                .plugin_registry()
                .get_for_kind(&ctrl.binding, ModelKind::Controller)
                .ok_or_else(|| {
                    model_err::<()>(format!("no plugin registered for binding '{}'", ctrl.binding))
                        .unwrap_err()
                })?;
            if plugin.kind != ModelKind::Controller {
                return inv_op(format!(
                    "binding '{}' is a {}, not a controller",
                    ctrl.binding, plugin.kind
                ));
            }
            plugins.insert(ctrl.binding.clone(), plugin.canonical_path.display().to_string());
            let instance = (plugin.factory)()?;
            models
                .controllers
                .insert(ctrl.instance_name().to_owned(), model::handle(instance));
        }

        for veh in &stack.vehicles {
            if let VehicleSource::FromVehicle { vehicle } = &veh.from {
                if !stack.vehicles.iter().any(|v| &v.name == vehicle) {
                    return inv_op(format!(
                        "vehicle '{}' clones unresolved vehicle '{}'",
                        veh.name, vehicle
                    ));
                }
            }
            let mut vehicle = Vehicle::new(veh.name.clone());
            for comp in &veh.components {
                let plugin = stack
                    .plugin_registry()
                    .get_for_kind(&comp.binding, ModelKind::Component)
                    .ok_or_else(|| {
                        model_err::<()>(format!(
                            "no plugin registered for binding '{}'",
                            comp.binding
                        ))
                        .unwrap_err()
                    })?;
                if plugin.kind != ModelKind::Component {
                    return inv_op(format!(
                        "binding '{}' is a {}, not a component",
                        comp.binding, plugin.kind
                    ));
                }
                plugins.insert(comp.binding.clone(), plugin.canonical_path.display().to_string());
                let instance = (plugin.factory)()?;
                vehicle
                    .components
                    .insert(comp.name.clone(), model::handle(instance));
            }
            models.vehicles.insert(veh.name.clone(), Arc::new(std::sync::Mutex::new(vehicle)));
        }

        Ok(SimulationContext {
            id: Uuid::new_v4(),
            sync: SimulationSync::new(stack.simulation.model_step_width),
            progress: SimulationProgress::new(),
            statistics: SimulationStatistics::new(),
            models,
            plugins,
            coordinator: Coordinator::new(),
            driver,
            interrupts: Arc::new(InterruptSlot::new()),
            pause_requested: false,
            outcome: None,
            probe_report: None,
            seed_triggers: stack.triggers.clone(),
            abort_from_connect: false,
            last_cycle_start: None,
            active_vehicles: stack.simulation.vehicles.clone(),
            active_controllers: stack.simulation.controllers.clone(),
            controller_retries: HashMap::new(),
        })
    }

    /// Enrolls every model's events/actions/signals with the coordinator.
    /// Simulators first, then vehicles' components, then controllers, so a
    /// controller can reference signals a component already bound (spec
    /// §4.3 "Enrollment").
    pub fn enroll_all(&mut self) -> Result<()> {
        for (name, handle) in self.models.simulators.iter() {
            Self::enroll_one(name, handle, &mut self.coordinator)?;
        }
        for vehicle in self.models.vehicles.values() {
            let vehicle = vehicle.lock().expect("vehicle lock poisoned");
            for (name, handle) in vehicle.components.iter() {
                Self::enroll_one(name, handle, &mut self.coordinator)?;
            }
        }
        for (name, handle) in self.models.controllers.iter() {
            Self::enroll_one(name, handle, &mut self.coordinator)?;
        }
        let mut driver_registrar = self.coordinator.enroll(crate::trigger::Source::Model);
        self.driver.register_action_factories(&mut driver_registrar)?;
        self.coordinator.absorb(driver_registrar);
        Ok(())
    }

    fn enroll_one(
        name: &str,
        handle: &model::ModelHandle,
        coordinator: &mut Coordinator,
    ) -> Result<()> {
        let mut registrar = coordinator.enroll(crate::trigger::Source::Model);
        let mut model = handle.lock().expect("model lock poisoned");
        model.enroll(&mut registrar).map_err(|e| {
            model_err::<()>(format!("model '{}' failed to enroll: {}", name, e)).unwrap_err()
        })?;
        drop(model);
        coordinator.absorb(registrar);
        Ok(())
    }

    /// Records one cycle's worth of controller retry bookkeeping,
    /// returning whether the retry limit has been exceeded.
    pub fn note_controller_attempt(&mut self, name: &str, succeeded: bool, limit: u32) -> bool {
        let counter = self.controller_retries.entry(name.to_owned()).or_insert(0);
        if succeeded {
            *counter = 0;
            false
        } else {
            *counter += 1;
            *counter > limit
        }
    }

    /// Every model handle across all kinds, for lifecycle calls that apply
    /// uniformly (spec §4.5: CONNECT, DISCONNECT).
    pub fn all_handles(&self) -> Vec<model::ModelHandle> {
        self.models.all_handles()
    }

    /// The free-form report assembled from the driver plus run statistics,
    /// included in `result.json` (spec §6 "output.rs").
    pub fn report(&self) -> Value {
        serde_json::json!({
            "uuid": self.id.to_string(),
            "driver": self.driver.produce_report(),
            "statistics": self.statistics,
            "trigger_history": self.coordinator.history(),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.sync.time()
    }

    /// Marks the start of a simulation cycle, for `cycle_time` measurement
    /// at the matching STEP_END.
    pub fn begin_cycle(&mut self) {
        self.last_cycle_start = Some(Instant::now());
    }

    /// The wall-clock duration since the matching `begin_cycle`, or zero if
    /// none was recorded (shouldn't happen on the nominal path).
    pub fn cycle_elapsed(&self) -> Duration {
        self.last_cycle_start
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NullDriver;

    fn empty_stack() -> Stack {
        Stack::new()
    }

    #[test]
    fn build_with_no_models_succeeds() {
        let stack = empty_stack();
        let ctx = SimulationContext::build(&stack, Box::new(NullDriver::new())).unwrap();
        assert!(ctx.all_handles().is_empty());
        assert_eq!(ctx.sync.step(), 0);
    }

    #[test]
    fn controller_retry_counter_resets_on_success() {
        let stack = empty_stack();
        let mut ctx = SimulationContext::build(&stack, Box::new(NullDriver::new())).unwrap();
        assert!(!ctx.note_controller_attempt("c1", false, 2));
        assert!(!ctx.note_controller_attempt("c1", false, 2));
        assert!(ctx.note_controller_attempt("c1", false, 2));
        assert!(!ctx.note_controller_attempt("c1", true, 2));
        assert!(!ctx.note_controller_attempt("c1", false, 2));
    }

    #[test]
    fn outcome_exit_codes_match_error_handling_design() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::Stopped.exit_code(), 8);
        assert_eq!(Outcome::Failure { reason: "x".into() }.exit_code(), 9);
        assert_eq!(Outcome::Aborted { reason: "x".into() }.exit_code(), 16);
        assert_eq!(Outcome::NoStart { reason: "x".into() }.exit_code(), 4);
    }
}
