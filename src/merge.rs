//! In-place deep merge for JSON values.
//!
//! Sources are overlaid onto the target one after another. Where both sides
//! hold an object the merge recurses; every other source value (scalar or
//! array) replaces the target value outright. JSON has no `undefined`, so a
//! `null` in a source counts as "not set" and leaves the target untouched.

use std::borrow::Borrow;

use serde_json::{Map, Value};

/// Merge each source into `target` in order and return `target`.
///
/// # Examples
///
/// ```rust
/// use tempo::merge::merge;
/// use serde_json::json;
///
/// let mut target = json!({});
/// merge(&mut target, &[json!({"a": {"b": 1}}), json!({"a": {"c": 2}})]);
/// assert_eq!(target, json!({"a": {"b": 1, "c": 2}}));
/// ```
pub fn merge<'a, I>(target: &'a mut Value, sources: I) -> &'a mut Value
where
    I: IntoIterator,
    I::Item: Borrow<Value>,
{
    for source in sources {
        merge_value(target, source.borrow());
    }
    target
}

/// Merge a single source into `target`.
pub fn merge_value(target: &mut Value, source: &Value) {
    match source {
        Value::Null => {}
        Value::Object(source_map) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(target_map) = target {
                merge_objects(target_map, source_map);
            }
        }
        other => *target = other.clone(),
    }
}

fn merge_objects(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if value.is_null() {
            continue;
        }
        match target.get_mut(key) {
            Some(existing) => merge_value(existing, value),
            None => {
                let mut fresh = if value.is_object() {
                    Value::Object(Map::new())
                } else {
                    Value::Null
                };
                merge_value(&mut fresh, value);
                target.insert(key.clone(), fresh);
            }
        }
    }
}
