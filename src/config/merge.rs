//! Layer merging
//!
//! Tables merge key by key, so a `[cluster]` table in one file only touches
//! the keys it names. Arrays such as `include` are replaced whole, and any
//! other value from a later layer wins.

use serde_json::{Map, Value};

/// Merge `overlay` into `base` in place.
fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => merge_tables(base_map, overlay_map),
        (slot, overlay) => *slot = overlay,
    }
}

fn merge_tables(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(&key) {
            Some(existing) => merge_into(existing, value),
            None => {
                base.insert(key, value);
            }
        }
    }
}

/// Merge `overlay` over `base` and return the result.
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    merge_into(&mut base, overlay);
    base
}

/// Fold layers lowest precedence first.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}
