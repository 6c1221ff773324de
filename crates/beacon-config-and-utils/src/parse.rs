//! Guarded JSON parsing.
//!
//! Host-supplied attribute payloads and stored arrays may be malformed. These
//! helpers never fail: bad input yields an empty value and a warning.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

/// Parse a JSON object of event properties.
///
/// Blank input is an empty map. Anything that is not a JSON object is logged
/// and replaced by an empty map.
pub fn parse_properties(raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = json_kind(&other), "event properties are not a JSON object, using empty properties");
            Map::new()
        }
        Err(err) => {
            warn!(error = %err, "malformed event properties, using empty properties");
            Map::new()
        }
    }
}

/// Parse a JSON array of `T`, yielding an empty vector on any error.
pub fn parse_json_array<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    match serde_json::from_str::<Vec<T>>(raw) {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "malformed JSON array, treating as empty");
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
