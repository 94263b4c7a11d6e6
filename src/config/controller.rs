//! `/controllers` entries: one controller instance, bound to exactly one
//! vehicle (spec §3 "Controller": "bound to exactly one Vehicle").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConf {
    #[serde(default)]
    pub name: Option<String>,
    pub binding: String,
    pub vehicle: String,
    #[serde(default)]
    pub args: Value,
}

impl ControllerConf {
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
        let conf: ControllerConf =
            serde_json::from_value(json!({"binding": "nop", "vehicle": "v"})).unwrap();
        assert_eq!(conf.instance_name(), "nop");
    }
}
