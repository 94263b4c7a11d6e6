//! `/simulation` block: parameters of the run itself, as distinct from the
//! engine's own operational settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConf {
    /// Logical step width of the simulation clock, given in nanoseconds.
    #[serde(with = "nanos", default = "default_model_step_width")]
    pub model_step_width: Duration,
    #[serde(default)]
    pub vehicles: Vec<String>,
    #[serde(default)]
    pub controllers: Vec<String>,
}

fn default_model_step_width() -> Duration {
    Duration::from_millis(20)
}

impl Default for SimulationConf {
    fn default() -> SimulationConf {
        SimulationConf {
            model_step_width: default_model_step_width(),
            vehicles: Vec::new(),
            controllers: Vec::new(),
        }
    }
}

mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_step_width_is_given_in_nanoseconds() {
        let conf: SimulationConf =
            serde_json::from_value(serde_json::json!({"model_step_width": 20_000_000u64}))
                .unwrap();
        assert_eq!(conf.model_step_width, Duration::from_millis(20));
    }

    #[test]
    fn default_step_width_is_20ms() {
        assert_eq!(SimulationConf::default().model_step_width, Duration::from_millis(20));
    }
}
