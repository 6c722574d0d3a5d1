//! String-to-JSON coercion for transport values.
//!
//! Headers, query strings, path segments, cookies and form fields all arrive as text.
//! Before a value reaches the schema validator it is converted to the JSON type its
//! schema asks for. A value that cannot be converted is passed through as a string so
//! the validator reports a proper type error for it.

use super::schema::schema_type;
use serde_json::Value;

/// Convert one raw value according to a scalar schema.
///
/// # Example
///
/// ```rust
/// use brrtrouter_args::model::decode_param_value;
/// use serde_json::json;
///
/// assert_eq!(decode_param_value("42", &json!({"type": "integer"})), json!(42));
/// assert_eq!(decode_param_value("abc", &json!({"type": "integer"})), json!("abc"));
/// assert_eq!(decode_param_value("on", &json!({"type": "boolean"})), json!(true));
/// ```
pub fn decode_param_value(value: &str, schema: &Value) -> Value {
    match schema_type(schema) {
        Some("integer") => {
            let trimmed = value.trim();
            trimmed
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| trimmed.parse::<u64>().map(Value::from))
                .unwrap_or_else(|_| Value::String(value.to_string()))
        }
        Some("number") => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string())),
        Some("boolean") => parse_bool(value)
            .map(Value::Bool)
            .unwrap_or_else(|| Value::String(value.to_string())),
        Some("null") if value.is_empty() => Value::Null,
        Some("object") | Some("array") => {
            // A structured value in a single slot is only accepted as inline JSON
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
        }
        _ => Value::String(value.to_string()),
    }
}

/// Convert every occurrence of a sequence-typed parameter using the item schema.
///
/// ```rust
/// use brrtrouter_args::model::decode_param_values;
/// use serde_json::json;
///
/// let schema = json!({"type": "array", "items": {"type": "integer"}});
/// let v = decode_param_values(&["1".to_string(), "2".to_string()], &schema);
/// assert_eq!(v, json!([1, 2]));
/// ```
pub fn decode_param_values<S: AsRef<str>>(values: &[S], schema: &Value) -> Value {
    let fallback = Value::Object(Default::default());
    let items = schema.get("items").unwrap_or(&fallback);
    Value::Array(
        values
            .iter()
            .map(|v| decode_param_value(v.as_ref(), items))
            .collect(),
    )
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
