//! The engine's own built-in `"nop"` simulator and controller: stand-ins
//! that connect, enroll nothing, and otherwise do nothing, for smoke tests.
//!
//! Grounded on `original_source/engine/src/plugins/{nop_simulator,
//! nop_controller}.hpp`: the original engine links these in directly
//! rather than loading them as `.so` plugins, which is why they are
//! registered into `PluginRegistry` as in-process factories instead of
//! resolved through `Plugin::load`.

use super::{ModelFactory, Plugin, PluginRegistry};
use crate::error::Result;
use crate::model::{Model, ModelKind, Registrar};
use crate::sync::SimulationSync;
use std::time::Duration;

struct NopModel {
    name: &'static str,
    connected: bool,
    operational: bool,
}

impl NopModel {
    fn new(name: &'static str) -> NopModel {
        NopModel {
            name,
            connected: false,
            operational: false,
        }
    }
}

impl Model for NopModel {
    fn name(&self) -> &str {
        self.name
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

fn factory() -> ModelFactory {
    Box::new(|| Ok(Box::new(NopModel::new("nop")) as Box<dyn Model>))
}

pub fn register(registry: &mut PluginRegistry) {
    registry.register_builtin(Plugin::in_process("nop", ModelKind::Simulator, factory()));
    registry.register_builtin(Plugin::in_process("nop", ModelKind::Controller, factory()));
}
