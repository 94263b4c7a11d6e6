//! The `Model` lifecycle interface shared by every participant in a
//! simulation, and the tagged variants that replace the original engine's
//! inheritance hierarchy (simulator/vehicle/component/controller).
//!
//! Grounded on the polymorphism design note (spec §9): "a single interface
//! ... is consumed by the state machine; concrete types are tagged variants
//! carried in per-kind maps." Rendered in the style of
//! `dqcsim/src/plugin/mod.rs`'s trait-object plugin handles.

pub mod registrar;
pub use registrar::{Registrar, SignalBinding};

use crate::error::Result;
use crate::sync::SimulationSync;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lifecycle shared by every model: simulators, controllers, vehicles, and
/// components. `constructed` is implicit (the value exists); the remaining
/// states are driven explicitly by the state machine, with
/// `pause/resume/reset/abort` available off the nominal path.
///
/// `Send` so that the `ModelRegistry` holding these, and in turn the whole
/// `SimulationContext`, can be handed wholesale to a watchdog worker thread
/// for the duration of one state's execution (spec §4.6) and handed back
/// once it returns — the driver thread remains the only one that ever runs
/// a model's methods, it just isn't always the *same* OS thread.
pub trait Model: Any + Send {
    /// Human-readable name, for logging and error messages.
    fn name(&self) -> &str;

    /// Establishes the model's connection to its backing plugin/process.
    /// Idempotent only in the sense that it is called exactly once per
    /// CONNECT attempt (including after a RESET).
    fn connect(&mut self) -> Result<()>;

    /// Registers this model's events, actions, and endpoints with the
    /// engine via `registrar`.
    fn enroll(&mut self, registrar: &mut Registrar) -> Result<()>;

    /// Called once, after all models have connected and enrolled, with the
    /// clock at its initial value.
    fn start(&mut self, sync: &SimulationSync) -> Result<()>;

    /// Called once per simulation cycle while the model is operational.
    /// Returns the model's own simulated time, in its own time domain, which
    /// the caller compares against `sync.time()` to detect a model silently
    /// falling behind (spec §4.5 STEP_SIMULATORS/STEP_CONTROLLERS).
    fn process(&mut self, sync: &SimulationSync) -> Result<Duration>;

    /// Called once when the run concludes (success, stop, failure, or
    /// reset), for every model that was started.
    fn stop(&mut self, sync: &SimulationSync) -> Result<()>;

    /// Tears down the plugin connection. Guaranteed to be called for every
    /// model that reached `connect`, on every exit path including ABORT.
    fn disconnect(&mut self) -> Result<()>;

    /// Best-effort pause notification; does not change `operational`.
    fn pause(&mut self, _sync: &SimulationSync) -> Result<()> {
        Ok(())
    }

    /// Best-effort resume notification.
    fn resume(&mut self, _sync: &SimulationSync) -> Result<()> {
        Ok(())
    }

    /// Returns the model to its pre-`start` state without disconnecting.
    /// Model-dependent; the core does not re-read the Stack across a reset
    /// (spec §9, Open Question b).
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    /// Best-effort immediate abort notification, tolerating failure.
    fn abort(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether `connect` has completed successfully.
    fn is_connected(&self) -> bool;

    /// Whether the model is currently expected to keep being stepped.
    fn is_operational(&self) -> bool;
}

/// The plugin-provided kind of a model, matching the ABI's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Simulator,
    Controller,
    Component,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ModelKind::Simulator => "simulator",
            ModelKind::Controller => "controller",
            ModelKind::Component => "component",
        };
        write!(f, "{}", s)
    }
}

/// A shared, mutable handle to a model. Vehicles and Components are shared
/// (a Simulator and one or more Controllers may hold a live reference to the
/// same Vehicle; a Component may be derived from another); Simulators and
/// Controllers are uniquely owned by the Simulation, but are still stored
/// behind the same handle type so all four kinds can live in uniform maps.
/// The `Box` layer is what lets a plugin factory's `Box<dyn Model>` move
/// straight into the handle without an extra unsafe unsized cast.
pub type ModelHandle = Arc<Mutex<Box<dyn Model>>>;

/// Wraps a freshly constructed model in a handle.
pub fn handle(model: Box<dyn Model>) -> ModelHandle {
    Arc::new(Mutex::new(model))
}

/// A Vehicle: an identified clone holding a map of named Components.
pub struct Vehicle {
    pub name: String,
    pub components: HashMap<String, ModelHandle>,
}

impl Vehicle {
    pub fn new(name: impl Into<String>) -> Vehicle {
        Vehicle {
            name: name.into(),
            components: HashMap::new(),
        }
    }
}

/// Per-kind maps of every model participating in a run. Simulators and
/// Controllers are keyed by their configured instance name; Vehicles by
/// their configured name.
#[derive(Default)]
pub struct ModelRegistry {
    pub simulators: HashMap<String, ModelHandle>,
    pub controllers: HashMap<String, ModelHandle>,
    pub vehicles: HashMap<String, Arc<Mutex<Vehicle>>>,
}

impl ModelRegistry {
    pub fn new() -> ModelRegistry {
        ModelRegistry::default()
    }

    /// Collects every model handle across all kinds, simulators first, then
    /// controllers, then each vehicle's components: for lifecycle calls that
    /// don't care about kind-specific ordering (e.g. `disconnect` during
    /// DISCONNECT).
    pub fn all_handles(&self) -> Vec<ModelHandle> {
        let mut handles: Vec<ModelHandle> = Vec::new();
        handles.extend(self.simulators.values().cloned());
        handles.extend(self.controllers.values().cloned());
        for vehicle in self.vehicles.values() {
            handles.extend(vehicle.lock().expect("vehicle lock poisoned").components.values().cloned());
        }
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NopModel {
        name: String,
        connected: bool,
        operational: bool,
    }

    impl Model for NopModel {
        fn name(&self) -> &str {
            &self.name
        }
        fn connect(&mut self) -> Result<()> {
            self.connected = true;
            Ok(())
        }
        fn enroll(&mut self, _registrar: &mut Registrar) -> Result<()> {
            Ok(())
        }
        fn start(&mut self, _sync: &SimulationSync) -> Result<()> {
            self.operational = true;
            Ok(())
        }
        fn process(&mut self, sync: &SimulationSync) -> Result<Duration> {
            Ok(sync.time())
        }
        fn stop(&mut self, _sync: &SimulationSync) -> Result<()> {
            self.operational = false;
            Ok(())
        }
        fn disconnect(&mut self) -> Result<()> {
            self.connected = false;
            Ok(())
        }
        fn is_connected(&self) -> bool {
            self.connected
        }
        fn is_operational(&self) -> bool {
            self.operational
        }
    }

    #[test]
    fn nop_model_lifecycle_transitions() {
        let mut m = NopModel {
            name: "nop".to_owned(),
            connected: false,
            operational: false,
        };
        m.connect().unwrap();
        assert!(m.is_connected());
        let sync = SimulationSync::default();
        m.start(&sync).unwrap();
        assert!(m.is_operational());
        m.stop(&sync).unwrap();
        assert!(!m.is_operational());
        m.disconnect().unwrap();
        assert!(!m.is_connected());
    }
}
