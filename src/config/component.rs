//! Component entries nested under a vehicle (spec §3 "Component": "a
//! polymorphic sensor/actuator; possibly derived from another Component by
//! dependency").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConf {
    pub name: String,
    pub binding: String,
    /// Name of another component on the same vehicle this one is derived
    /// from, if any.
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub args: Value,
}
