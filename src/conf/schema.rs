//! Lightweight schema descriptors, used by `Stack`'s Confable fields to
//! self-describe for the `usage` subcommand and for residual-schema
//! validation of merged configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The JSON type a schema node accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

/// Describes one field of a Confable: its type, whether it's required, an
/// optional default, a human-readable description, and (for objects) nested
/// property schemas.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
}

impl Schema {
    pub fn new(kind: SchemaType, description: impl Into<String>) -> Schema {
        Schema {
            kind,
            description: description.into(),
            required: false,
            default: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn required(mut self) -> Schema {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Schema {
        self.default = Some(default);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Schema {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Renders a one-line-per-field textual description, as used by the
    /// `usage` subcommand when pointed at a key or path within the Stack.
    pub fn describe(&self, prefix: &str) -> String {
        let mut out = String::new();
        self.describe_into(prefix, &mut out);
        out
    }

    fn describe_into(&self, prefix: &str, out: &mut String) {
        out.push_str(&format!(
            "{:<40} {:8} {}{}\n",
            prefix,
            format!("{:?}", self.kind).to_lowercase(),
            if self.required { "(required) " } else { "" },
            self.description
        ));
        for (name, child) in &self.properties {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            child.describe_into(&path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_nested_properties() {
        let schema = Schema::new(SchemaType::Object, "engine options").with_property(
            "watchdog",
            Schema::new(SchemaType::Object, "watchdog options").with_property(
                "mode",
                Schema::new(SchemaType::String, "watchdog mode").with_default(Value::from("off")),
            ),
        );
        let text = schema.describe("engine");
        assert!(text.contains("engine"));
        assert!(text.contains("engine/watchdog"));
        assert!(text.contains("engine/watchdog/mode"));
    }
}
