//! `Conf`: a parsed configuration node carrying file and JSON-pointer
//! provenance, so that validation errors can always be pinned to the exact
//! file and location that produced them.
//!
//! Grounded on the `Conf`/JSON-pointer provenance described for the Stack's
//! schema-driven configuration; rendered in the idiom of
//! `dqcsim/src/configuration/plugin.rs`'s serde-derived config structs, using
//! `serde_json::Value` as the underlying tree the way the teacher pack's
//! configuration types lean on `serde_json`/`serde_yaml` throughout.

mod schema;
pub use schema::{Schema, SchemaType};

pub mod interpolate;

mod reader;
pub use reader::{ConfReader, FileConfReader};

use crate::error::{conf_err, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A node of parsed configuration, remembering where it came from.
///
/// `file` is the source file this node (or an ancestor it was sliced from)
/// was read from, if any: inline/CLI-constructed Confs have `None`. `pointer`
/// is the absolute JSON pointer of this node within that file's document
/// root, so that `at()`/`get()` accumulate a precise location as they
/// descend, letting [`Conf::error`] always name both.
#[derive(Debug, Clone)]
pub struct Conf {
    value: Value,
    file: Option<PathBuf>,
    pointer: String,
}

impl Conf {
    /// Wraps a bare JSON value with no file provenance (e.g. CLI-provided
    /// overrides, or values built up in tests).
    pub fn new(value: Value) -> Conf {
        Conf {
            value,
            file: None,
            pointer: String::new(),
        }
    }

    /// Wraps a JSON value sourced from `file`.
    pub fn from_file(value: Value, file: impl Into<PathBuf>) -> Conf {
        Conf {
            value,
            file: Some(file.into()),
            pointer: String::new(),
        }
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Builds a [`ConfError`](crate::error::ErrorKind::ConfError) pinned to
    /// this node's file and pointer.
    pub fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        let pointer = if self.pointer.is_empty() {
            "/".to_owned()
        } else {
            self.pointer.clone()
        };
        let pointer = match &self.file {
            Some(f) => format!("{}#{}", f.display(), pointer),
            None => pointer,
        };
        conf_err(pointer, message)
    }

    /// Descends to a child node at `key`, preserving file provenance and
    /// extending the pointer trail. Returns a [`ConfError`] if the child is
    /// missing or this node is not a JSON object.
    pub fn at(&self, key: &str) -> Result<Conf> {
        let child = self
            .value
            .as_object()
            .and_then(|obj| obj.get(key))
            .cloned();
        match child {
            Some(value) => Ok(Conf {
                value,
                file: self.file.clone(),
                pointer: format!("{}/{}", self.pointer, key),
            }),
            None => self.error(format!("missing required field '{}'", key)),
        }
    }

    /// Like [`Conf::at`], but returns `None` instead of an error when the key
    /// is absent.
    pub fn get(&self, key: &str) -> Option<Conf> {
        self.value
            .as_object()
            .and_then(|obj| obj.get(key))
            .cloned()
            .map(|value| Conf {
                value,
                file: self.file.clone(),
                pointer: format!("{}/{}", self.pointer, key),
            })
    }

    /// Resolves a full JSON pointer (`/engine/watchdog/mode`) against this
    /// node, returning `None` if any segment along the way is missing.
    pub fn pointer_get(&self, pointer: &str) -> Option<Conf> {
        self.value.pointer(pointer).cloned().map(|value| Conf {
            value,
            file: self.file.clone(),
            pointer: format!("{}{}", self.pointer, pointer),
        })
    }

    /// Erases `pointer` from this node's tree, if present. Used to remove
    /// `/engine/ignore` entries and ignored pointers once they have been
    /// accounted for.
    pub fn erase_pointer(&mut self, pointer: &str) {
        if pointer.is_empty() || pointer == "/" {
            self.value = Value::Null;
            return;
        }
        let (parent_ptr, last) = match pointer.rfind('/') {
            Some(idx) => (&pointer[..idx], &pointer[idx + 1..]),
            None => return,
        };
        let parent = if parent_ptr.is_empty() {
            Some(&mut self.value)
        } else {
            self.value.pointer_mut(parent_ptr)
        };
        if let Some(Value::Object(map)) = parent {
            map.remove(last);
        } else if let Some(Value::Array(arr)) = parent {
            if let Ok(idx) = last.parse::<usize>() {
                if idx < arr.len() {
                    arr.remove(idx);
                }
            }
        }
    }

    /// Whether this node is a JSON object.
    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    /// Iterates `(key, Conf)` pairs if this node is an object, in insertion
    /// order.
    pub fn iter_fields(&self) -> impl Iterator<Item = (String, Conf)> + '_ {
        let file = self.file.clone();
        let pointer = self.pointer.clone();
        self.value
            .as_object()
            .into_iter()
            .flat_map(|obj| obj.iter())
            .map(move |(k, v)| {
                (
                    k.clone(),
                    Conf {
                        value: v.clone(),
                        file: file.clone(),
                        pointer: format!("{}/{}", pointer, k),
                    },
                )
            })
    }

    /// Iterates array elements if this node is an array, each tagged with
    /// its index in the pointer trail.
    pub fn iter_elements(&self) -> impl Iterator<Item = Conf> + '_ {
        let file = self.file.clone();
        let pointer = self.pointer.clone();
        self.value
            .as_array()
            .into_iter()
            .flatten()
            .enumerate()
            .map(move |(i, v)| Conf {
                value: v.clone(),
                file: file.clone(),
                pointer: format!("{}/{}", pointer, i),
            })
    }

    /// Deserializes this node into `T`, wrapping any `serde_json` error as a
    /// [`ConfError`] pinned to this node.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).or_else(|e| self.error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn at_descends_and_tracks_pointer() {
        let conf = Conf::new(json!({"engine": {"watchdog": {"mode": "abort"}}}));
        let watchdog = conf.at("engine").unwrap().at("watchdog").unwrap();
        assert_eq!(watchdog.pointer(), "/engine/watchdog");
        let mode = watchdog.at("mode").unwrap();
        assert_eq!(mode.value(), &json!("abort"));
    }

    #[test]
    fn at_missing_field_errors_with_pointer() {
        let conf = Conf::from_file(json!({}), "stack.json");
        let err = conf.at("engine").unwrap_err();
        assert!(err.to_string().contains("stack.json"));
    }

    #[test]
    fn erase_pointer_removes_nested_key() {
        let mut conf = Conf::new(json!({"engine": {"ignore": ["/a"], "other": 1}}));
        conf.erase_pointer("/engine/ignore");
        assert!(conf.value().pointer("/engine/ignore").is_none());
        assert!(conf.value().pointer("/engine/other").is_some());
    }

    #[test]
    fn pointer_get_resolves_multi_segment_path() {
        let conf = Conf::new(json!({"engine": {"watchdog": {"mode": "abort"}}}));
        let mode = conf.pointer_get("/engine/watchdog/mode").unwrap();
        assert_eq!(mode.value(), &json!("abort"));
    }
}
