use serde_json::Value;

use crate::form::FieldMap;

/// Keys of `current` whose value differs from `acknowledged`, with their new
/// values. A key missing on either side counts as `null`. Arrays compare as
/// multisets, so reordering a selection is not a change.
pub fn diff_fields(acknowledged: &FieldMap, current: &FieldMap) -> FieldMap {
    let mut changed = FieldMap::new();
    for (key, value) in current {
        let previous = acknowledged.get(key).unwrap_or(&Value::Null);
        if !values_equal(previous, value) {
            changed.insert(key.clone(), value.clone());
        }
    }
    for key in acknowledged.keys() {
        if !current.contains_key(key) && !acknowledged[key].is_null() {
            changed.insert(key.clone(), Value::Null);
        }
    }
    changed
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(left), Value::Array(right)) => {
            if left.len() != right.len() {
                return false;
            }
            let mut unmatched: Vec<&Value> = right.iter().collect();
            for item in left {
                match unmatched.iter().position(|other| values_equal(item, other)) {
                    Some(index) => {
                        unmatched.swap_remove(index);
                    }
                    None => return false,
                }
            }
            true
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(k, v)| right.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}
