//! Conversion of API responses into the dynamic value tree
//!
//! Every query runs over a plain `serde_json::Value`, so typed responses and
//! raw bodies are converted at this boundary and nowhere else.

use serde::Serialize;
use serde_json::{json, Value};

/// Convert a typed structure into a value tree
pub fn normalize<T: Serialize + ?Sized>(typed: &T) -> serde_json::Result<Value> {
    serde_json::to_value(typed)
}

/// Parse a raw JSON response body
pub fn parse_body(body: &str) -> serde_json::Result<Value> {
    serde_json::from_str(body)
}

/// Wrap aggregated list items under their response key
///
/// `build_collection("databases", &items)` produces `{"databases": [...]}`,
/// the same shape a single unpaginated response would have. Items may be
/// raw values or any typed records.
pub fn build_collection<T: Serialize>(list_key: &str, items: &[T]) -> serde_json::Result<Value> {
    let items = normalize(items)?;
    Ok(json!({ list_key: items }))
}

/// Extract the list stored under `list_key`.
///
/// A missing key or null yields an empty list; a single object where a list
/// was expected is treated as a one-element list.
pub fn extract_list(json: &Value, list_key: &str) -> Vec<Value> {
    match json.get(list_key) {
        Some(Value::Array(arr)) => arr.clone(),
        Some(Value::Null) | None => vec![],
        Some(other) => vec![other.clone()],
    }
}

/// Convert a value to its display form
pub fn value_to_string(value: &Value, default: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => default.to_string(),
        Value::Array(arr) => arr
            .iter()
            .map(|v| value_to_string(v, default))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}
