pub mod signal;

use serde_json::Value;

/// Merges `overlay` onto `base` in place: objects merge key-by-key
/// (recursively), arrays are concatenated (`base` entries first), and any
/// other value is replaced outright. Arrays extend rather than replace
/// between layers.
pub fn merge_json(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(base_vec), Value::Array(overlay_vec)) => {
            base_vec.extend(overlay_vec.iter().cloned());
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
