use serde_json::{Map, Value};

use crate::error::ReducerError;

/// Recursively merge `source` into `target`.
///
/// Object keys merge recursively; any other value (arrays included)
/// overwrites what was there.
pub fn deep_merge(target: &Value, source: &Value) -> Value {
    match (target, source) {
        (Value::Object(base), Value::Object(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, other) => other.clone(),
    }
}

/// One-level merge of two objects; keys in `patch` win.
pub fn shallow_merge(base: &Value, patch: &Value) -> Result<Value, ReducerError> {
    let mut merged: Map<String, Value> = as_object(base)?.clone();
    for (key, value) in as_object(patch)? {
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, ReducerError> {
    value.as_object().ok_or(ReducerError::NotAnObject {
        found: kind(value),
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
