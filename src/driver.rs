//! The scripting-driver surface: the abstraction point behind which any
//! embedded language can sit without leaking its own types into the core
//! (spec §4.8/§9 "Scripting driver").
//!
//! Grounded on the driver-adapter design note: `initialize`, register
//! action/event factories, alias/bind signals, yield pending triggers, and
//! produce a final report. Rendered in the teacher's trait-object-plus-
//! `Box<dyn ...>` idiom (`dqcsim/src/host/plugin/mod.rs`'s `Plugin` trait).

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::model::{Registrar, SignalBinding};
use crate::sync::SimulationSync;
use crate::trigger::Source;
use serde_json::Value;

/// Abstract scripting-driver surface. `NullDriver` below is a no-op stand-in
/// used when no scripting language is configured, and by tests.
pub trait Driver: Send {
    /// Human-readable identifier, e.g. the script file name, for logging.
    fn name(&self) -> &str;

    /// Called once, before CONNECT, with the clock at its initial value and
    /// a handle onto the coordinator the driver can queue triggers through.
    fn initialize(&mut self, sync: &SimulationSync) -> Result<()>;

    /// Registers this driver's own event/action factories (e.g. a
    /// scripting-language-level `lua()` action) with `registrar`.
    fn register_action_factories(&mut self, registrar: &mut Registrar) -> Result<()>;

    /// Signal alias/bind requests to apply during CONNECT (spec §4.7).
    fn signal_requests(&self) -> &[SignalBinding];

    /// Drains any triggers the driver has produced since the last call
    /// (e.g. from script-level event handlers), to be queued onto the
    /// coordinator.
    fn yield_pending_triggers(&mut self) -> Vec<Value>;

    /// Produces a free-form report included in the final result record.
    fn produce_report(&self) -> Value;
}

/// The trivial driver: no scripting language, no signal requests, no
/// report beyond an empty object. Used when the user configures no
/// scripting surface, and as the default in tests.
#[derive(Debug, Default)]
pub struct NullDriver {
    signals: Vec<SignalBinding>,
}

impl NullDriver {
    pub fn new() -> NullDriver {
        NullDriver::default()
    }
}

impl Driver for NullDriver {
    fn name(&self) -> &str {
        "null"
    }

    fn initialize(&mut self, _sync: &SimulationSync) -> Result<()> {
        Ok(())
    }

    fn register_action_factories(&mut self, _registrar: &mut Registrar) -> Result<()> {
        Ok(())
    }

    fn signal_requests(&self) -> &[SignalBinding] {
        &self.signals
    }

    fn yield_pending_triggers(&mut self) -> Vec<Value> {
        Vec::new()
    }

    fn produce_report(&self) -> Value {
        serde_json::json!({})
    }
}

/// Applies every signal alias/bind request the driver made to the
/// coordinator's enrollment, logging failures as model errors per spec
/// §4.7 ("either failing causes a model error").
pub fn apply_signal_requests(driver: &dyn Driver, coordinator: &mut Coordinator) -> Result<()> {
    let mut registrar = coordinator.enroll(Source::Model);
    for request in driver.signal_requests() {
        if request.name.is_empty() {
            return crate::error::model_err("signal binding request has an empty name");
        }
        registrar.signals.push(request.clone());
    }
    coordinator.absorb(registrar);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubDriver {
        signals: Vec<SignalBinding>,
    }

    impl Driver for StubDriver {
        fn name(&self) -> &str {
            "stub"
        }
        fn initialize(&mut self, _sync: &SimulationSync) -> Result<()> {
            Ok(())
        }
        fn register_action_factories(&mut self, _registrar: &mut Registrar) -> Result<()> {
            Ok(())
        }
        fn signal_requests(&self) -> &[SignalBinding] {
            &self.signals
        }
        fn yield_pending_triggers(&mut self) -> Vec<Value> {
            Vec::new()
        }
        fn produce_report(&self) -> Value {
            serde_json::json!({})
        }
    }

    #[test]
    fn signal_requests_are_merged_into_the_coordinator() {
        let driver = StubDriver {
            signals: vec![SignalBinding {
                name: "vehicle.speed".to_owned(),
                type_descriptor: "double".to_owned(),
                alias_of: None,
            }],
        };
        let mut coordinator = Coordinator::new();
        apply_signal_requests(&driver, &mut coordinator).unwrap();
        assert_eq!(coordinator.signals().len(), 1);
        assert_eq!(coordinator.signals()[0].name, "vehicle.speed");
    }

    #[test]
    fn a_signal_request_with_an_empty_name_is_a_model_error() {
        let driver = StubDriver {
            signals: vec![SignalBinding {
                name: String::new(),
                type_descriptor: "double".to_owned(),
                alias_of: None,
            }],
        };
        let mut coordinator = Coordinator::new();
        assert!(apply_signal_requests(&driver, &mut coordinator).is_err());
    }
}
