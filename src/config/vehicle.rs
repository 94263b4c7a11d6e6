//! `/vehicles` entries: a named handle onto a simulator-owned vehicle, or a
//! clone of another already-configured vehicle (spec §3 "Vehicle": "an
//! identified clone holding a map of named Components").

use serde::{Deserialize, Serialize};

/// Where a configured vehicle's underlying model comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VehicleSource {
    /// The `index`-th vehicle exposed by simulator `simulator`.
    FromSimulator { simulator: String, index: u64 },
    /// A clone of an already-configured vehicle, used to attach a second,
    /// independent set of components to the same underlying model.
    FromVehicle { vehicle: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConf {
    pub name: String,
    pub from: VehicleSource,
    /// Components attached to this vehicle beyond what the simulator
    /// provides natively, keyed by instance name.
    #[serde(default)]
    pub components: Vec<super::component::ComponentConf>,
}

impl VehicleConf {
    /// The name this vehicle's source resolves against: either a simulator
    /// instance name or another vehicle's name, for `validate()`'s
    /// reference-resolution pass.
    pub fn source_reference(&self) -> &str {
        match &self.from {
            VehicleSource::FromSimulator { simulator, .. } => simulator,
            VehicleSource::FromVehicle { vehicle } => vehicle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_simulator_source() {
        let conf: VehicleConf =
            serde_json::from_value(json!({"name": "v", "from": {"simulator": "nop", "index": 0}}))
                .unwrap();
        assert_eq!(conf.source_reference(), "nop");
    }

    #[test]
    fn parses_vehicle_clone_source() {
        let conf: VehicleConf =
            serde_json::from_value(json!({"name": "v2", "from": {"vehicle": "v"}})).unwrap();
        assert_eq!(conf.source_reference(), "v");
    }
}
