//! `/defaults` blocks: per-`(binding, name)` argument overlays applied
//! underneath an instance's own `args` before it reaches a plugin factory
//! (spec §3 "Stack": "default value merging"; §4.1 step 8 "residual
//! schema").

use crate::util::merge_json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `/defaults/<kind>` entry. `name` narrows the overlay to a single
/// instance; when absent, the entry applies to every instance of `binding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultEntry {
    pub binding: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Value,
}

impl DefaultEntry {
    fn matches(&self, binding: &str, name: &str) -> bool {
        self.binding == binding && self.name.as_deref().map_or(true, |n| n == name)
    }
}

/// `/defaults`, grouped by model kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConf {
    #[serde(default)]
    pub simulators: Vec<DefaultEntry>,
    #[serde(default)]
    pub vehicles: Vec<DefaultEntry>,
    #[serde(default)]
    pub controllers: Vec<DefaultEntry>,
    #[serde(default)]
    pub components: Vec<DefaultEntry>,
}

/// Which `/defaults` list an instance's kind draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultsKind {
    Simulator,
    Vehicle,
    Controller,
    Component,
}

impl DefaultsConf {
    fn entries(&self, kind: DefaultsKind) -> &[DefaultEntry] {
        match kind {
            DefaultsKind::Simulator => &self.simulators,
            DefaultsKind::Vehicle => &self.vehicles,
            DefaultsKind::Controller => &self.controllers,
            DefaultsKind::Component => &self.components,
        }
    }

    /// Merges every matching default entry (in declaration order, so later
    /// entries win over earlier ones) underneath `args`, returning the
    /// combined arguments handed to the plugin factory.
    pub fn apply(&self, kind: DefaultsKind, binding: &str, name: &str, args: &Value) -> Value {
        let mut merged = Value::Object(Default::default());
        for entry in self.entries(kind).iter().filter(|e| e.matches(binding, name)) {
            merge_json(&mut merged, &entry.args);
        }
        merge_json(&mut merged, args);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_args_are_overridden_by_instance_args() {
        let defaults = DefaultsConf {
            simulators: vec![DefaultEntry {
                binding: "nop".to_owned(),
                name: None,
                args: json!({"speed": 1, "seed": 42}),
            }],
            ..Default::default()
        };
        let merged = defaults.apply(
            DefaultsKind::Simulator,
            "nop",
            "nop",
            &json!({"speed": 5}),
        );
        assert_eq!(merged, json!({"speed": 5, "seed": 42}));
    }

    #[test]
    fn named_default_only_applies_to_matching_instance() {
        let defaults = DefaultsConf {
            simulators: vec![DefaultEntry {
                binding: "nop".to_owned(),
                name: Some("sim1".to_owned()),
                args: json!({"seed": 7}),
            }],
            ..Default::default()
        };
        assert_eq!(
            defaults.apply(DefaultsKind::Simulator, "nop", "sim1", &json!({})),
            json!({"seed": 7})
        );
        assert_eq!(
            defaults.apply(DefaultsKind::Simulator, "nop", "sim2", &json!({})),
            json!({})
        );
    }
}
