//! Accessors for OSM payloads, whose field names and value types drift
//! between endpoints (ids arrive as numbers or strings, lists are nested
//! under different keys).

use serde_json::Value;

/// First of `names` present on `value` with a non-null value.
pub fn field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| value.get(*name))
        .find(|v| !v.is_null())
}

/// Scalar as a string: non-empty strings as-is, numbers formatted.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First of `names` that holds a usable string or number.
pub fn str_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| value.get(*name))
        .find_map(scalar_string)
}

/// String at a nested path, e.g. `["meta", "group_name"]`.
pub fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    scalar_string(current)
}

/// Number from a numeric value or a numeric string.
pub fn f64_field(value: &Value, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .filter_map(|name| value.get(*name))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

/// Array at a nested path; the empty path means `value` itself.
pub fn array_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Vec<Value>> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_array()
}

/// The first of `paths` that resolves to an array.
pub fn first_array<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Vec<Value>> {
    paths.iter().find_map(|path| array_at(value, path))
}

/// JavaScript-style truthiness for flag fields (`true`, `1`, `"1"`, `"true"`, `"Y"`).
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "y" | "yes"),
        _ => false,
    }
}

/// Top-level keys of an object, for diagnostics.
pub fn object_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(_) => vec!["<array>".to_string()],
        _ => Vec::new(),
    }
}
