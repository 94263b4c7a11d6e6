//! `/simulators` entries: one instance of a simulator plugin per entry.
//!
//! Grounded on `dqcsim/src/configuration/plugin.rs`'s serde-derived config
//! struct shape, adapted from DQCsim's frontend/operator/backend trio to
//! Cloe's simulator/vehicle/controller trio (spec §3 "Model").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One configured simulator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConf {
    /// Instance name; defaults to `binding` if not given. Must be unique
    /// across all four model namespaces plus the reserved words (spec §4.1
    /// `validate()`).
    #[serde(default)]
    pub name: Option<String>,

    /// The plugin short name this instance is constructed from.
    pub binding: String,

    /// Factory arguments, passed to the plugin's factory after any
    /// applicable `/defaults` entry has been merged underneath them.
    #[serde(default)]
    pub args: Value,
}

impl SimulatorConf {
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_name_falls_back_to_binding() {
        let conf: SimulatorConf = serde_json::from_value(json!({"binding": "nop"})).unwrap();
        assert_eq!(conf.instance_name(), "nop");
    }

    #[test]
    fn explicit_name_overrides_binding() {
        let conf: SimulatorConf =
            serde_json::from_value(json!({"binding": "nop", "name": "sim1"})).unwrap();
        assert_eq!(conf.instance_name(), "sim1");
    }
}
