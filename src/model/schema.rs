//! Schema helpers: `$ref` expansion, shape classification and composite expansion.

use crate::error::ConfigError;
use crate::params::{FieldSpec, ParamSource};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Maximum nesting followed while expanding `$ref`s. Deeper (recursive) references are
/// replaced with an unconstrained schema.
const MAX_REF_DEPTH: usize = 16;

/// Named schemas a handler's parameter types may refer to.
///
/// This plays the role of the handler module's global namespace: a forward reference
/// `TypeRef::Named("Item")` or a `{"$ref": "#/components/schemas/Item"}` pointer is
/// looked up here before the parameter is classified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNamespace {
    schemas: HashMap<String, Value>,
}

impl SchemaNamespace {
    pub fn new() -> Self {
        SchemaNamespace::default()
    }

    pub fn with(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.insert(name, schema);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: Value) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Name a `$ref` points at: `#/components/schemas/Item`, `#/definitions/Item`,
    /// `#/$defs/Item` or `#/Item`.
    fn ref_name(ref_path: &str) -> Option<&str> {
        ["#/components/schemas/", "#/definitions/", "#/$defs/", "#/"]
            .iter()
            .find_map(|prefix| ref_path.strip_prefix(prefix))
    }
}

/// Recursively replace every `$ref` in `value` with the named schema from `ns`.
///
/// Adds an `x-ref-name` member so the original type name survives for OpenAPI output.
///
/// # Errors
///
/// Returns the unresolved type name when a reference is not in the namespace.
pub fn expand_schema_refs(ns: &SchemaNamespace, value: &mut Value) -> Result<(), String> {
    expand_refs_at(ns, value, 0)
}

fn expand_refs_at(ns: &SchemaNamespace, value: &mut Value, depth: usize) -> Result<(), String> {
    match value {
        Value::Object(obj) => {
            if let Some(ref_path) = obj.get("$ref").and_then(|v| v.as_str()) {
                let name = SchemaNamespace::ref_name(ref_path)
                    .ok_or_else(|| ref_path.to_string())?
                    .to_string();
                if depth >= MAX_REF_DEPTH {
                    *value = Value::Object(Map::new());
                    return Ok(());
                }
                let mut resolved = ns.get(&name).cloned().ok_or_else(|| name.clone())?;
                expand_refs_at(ns, &mut resolved, depth + 1)?;
                if let Value::Object(o) = &mut resolved {
                    o.insert("x-ref-name".to_string(), Value::String(name));
                }
                *value = resolved;
                return Ok(());
            }
            for v in obj.values_mut() {
                expand_refs_at(ns, v, depth)?;
            }
            Ok(())
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                expand_refs_at(ns, v, depth)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// The JSON type a schema describes, ignoring `null` in nullable unions.
pub fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(s)) => return Some(s.as_str()),
        Some(Value::Array(types)) => {
            return types
                .iter()
                .filter_map(|t| t.as_str())
                .find(|t| *t != "null")
                .or(Some("null"));
        }
        _ => {}
    }
    for key in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = schema.get(key) {
            if let Some(t) = branches
                .iter()
                .filter_map(schema_type)
                .find(|t| *t != "null")
            {
                return Some(t);
            }
        }
    }
    if schema.get("properties").is_some() {
        return Some("object");
    }
    if schema.get("items").is_some() {
        return Some("array");
    }
    None
}

/// Strings, numbers, booleans, enums and untyped values.
pub fn is_scalar(schema: &Value) -> bool {
    match schema_type(schema) {
        Some("string") | Some("integer") | Some("number") | Some("boolean") | Some("null") => {
            true
        }
        Some(_) => false,
        None => true,
    }
}

pub fn is_sequence(schema: &Value) -> bool {
    schema_type(schema) == Some("array")
}

pub fn is_object(schema: &Value) -> bool {
    schema_type(schema) == Some("object")
}

/// An array whose items are scalars (or unspecified).
pub fn is_scalar_sequence(schema: &Value) -> bool {
    is_sequence(schema) && schema.get("items").map(is_scalar).unwrap_or(true)
}

fn is_binary(schema: &Value) -> bool {
    schema.get("format").and_then(|f| f.as_str()) == Some("binary")
}

/// How a field's value is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Scalar,
    Sequence,
    Object,
    /// No declared type
    Any,
    /// File contents read into memory
    Binary,
    BinarySequence,
    /// Upload handle with filename and content type
    Upload,
    UploadSequence,
}

impl FieldShape {
    /// Classify a declared schema for the given source.
    pub fn classify(source: ParamSource, schema: &Value) -> FieldShape {
        if source == ParamSource::File {
            return if is_sequence(schema) {
                match schema.get("items") {
                    Some(items) if is_binary(items) => FieldShape::BinarySequence,
                    _ => FieldShape::UploadSequence,
                }
            } else if is_binary(schema) {
                FieldShape::Binary
            } else {
                FieldShape::Upload
            };
        }
        match schema_type(schema) {
            Some("array") => FieldShape::Sequence,
            Some("object") => FieldShape::Object,
            Some(_) => FieldShape::Scalar,
            None => FieldShape::Any,
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            FieldShape::Sequence | FieldShape::BinarySequence | FieldShape::UploadSequence
        )
    }

    pub fn is_file(&self) -> bool {
        matches!(
            self,
            FieldShape::Binary
                | FieldShape::BinarySequence
                | FieldShape::Upload
                | FieldShape::UploadSequence
        )
    }
}

/// Turn an object-typed parameter into one scalar field per property.
///
/// Only the first level of properties is walked. Each child inherits the parent's
/// source and underscore conversion, is required iff listed in the parent's
/// `required`, and takes the property's `default` when it has one.
///
/// # Errors
///
/// `ConfigError::NonScalarCompositeField` for a property that is neither a scalar nor
/// a sequence of scalars.
pub fn expand_composite(
    parent: &str,
    parent_spec: &FieldSpec,
    schema: &Value,
) -> Result<Vec<(FieldSpec, Value)>, ConfigError> {
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    let mut children = Vec::with_capacity(properties.len());
    for (field, field_schema) in properties {
        let scalar_ok = if parent_spec.source() == ParamSource::Cookie {
            is_scalar(field_schema)
        } else {
            is_scalar(field_schema) || is_scalar_sequence(field_schema)
        };
        if !scalar_ok {
            return Err(ConfigError::NonScalarCompositeField {
                param: parent.to_string(),
                field: field.clone(),
            });
        }
        let mut child = match parent_spec.source() {
            ParamSource::Header => FieldSpec::header(),
            ParamSource::Cookie => FieldSpec::cookie(),
            _ => FieldSpec::query(),
        }
        .convert_underscores(parent_spec.converts_underscores());
        if !required.contains(&field.as_str()) {
            child = child.default(field_schema.get("default").cloned().unwrap_or(Value::Null));
        }
        children.push((child.named(field), field_schema.clone()));
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand_refs_against_namespace() {
        let ns = SchemaNamespace::new().with(
            "Item",
            json!({"type": "object", "properties": {"tag": {"$ref": "#/components/schemas/Tag"}}}),
        )
        .with("Tag", json!({"type": "string"}));
        let mut v = json!({"$ref": "#/components/schemas/Item"});
        expand_schema_refs(&ns, &mut v).unwrap();
        assert_eq!(v["x-ref-name"], json!("Item"));
        assert_eq!(v["properties"]["tag"]["type"], json!("string"));
    }

    #[test]
    fn test_unresolved_ref() {
        let mut v = json!({"items": {"$ref": "#/components/schemas/Missing"}});
        assert_eq!(
            expand_schema_refs(&SchemaNamespace::new(), &mut v),
            Err("Missing".to_string())
        );
    }

    #[test]
    fn test_recursive_ref_is_bounded() {
        let ns = SchemaNamespace::new().with(
            "Node",
            json!({"type": "object", "properties": {"next": {"$ref": "#/Node"}}}),
        );
        let mut v = json!({"$ref": "#/Node"});
        assert!(expand_schema_refs(&ns, &mut v).is_ok());
    }

    #[test]
    fn test_classify() {
        assert_eq!(FieldShape::classify(ParamSource::Query, &json!({"type": "integer"})), FieldShape::Scalar);
        assert_eq!(
            FieldShape::classify(ParamSource::Query, &json!({"type": "array", "items": {"type": "string"}})),
            FieldShape::Sequence
        );
        assert_eq!(FieldShape::classify(ParamSource::Body, &json!({})), FieldShape::Any);
        assert_eq!(
            FieldShape::classify(ParamSource::File, &json!({"type": "string", "format": "binary"})),
            FieldShape::Binary
        );
        assert_eq!(
            FieldShape::classify(
                ParamSource::File,
                &json!({"type": "array", "items": {"type": "string", "format": "binary"}})
            ),
            FieldShape::BinarySequence
        );
        assert_eq!(FieldShape::classify(ParamSource::File, &json!({})), FieldShape::Upload);
    }

    #[test]
    fn test_nullable_type() {
        assert_eq!(schema_type(&json!({"type": ["null", "string"]})), Some("string"));
        assert_eq!(
            schema_type(&json!({"anyOf": [{"type": "integer"}, {"type": "null"}]})),
            Some("integer")
        );
    }

    #[test]
    fn test_expand_composite() {
        let schema = json!({
            "type": "object",
            "properties": {
                "page": {"type": "integer", "default": 1},
                "tags": {"type": "array", "items": {"type": "string"}},
                "q": {"type": "string"}
            },
            "required": ["q"]
        });
        let children = expand_composite("filters", &FieldSpec::query(), &schema).unwrap();
        assert_eq!(children.len(), 3);
        let page = children.iter().find(|(s, _)| s.name() == Some("page")).unwrap();
        assert_eq!(page.0.default_value(), Some(&json!(1)));
        let q = children.iter().find(|(s, _)| s.name() == Some("q")).unwrap();
        assert!(q.0.is_required());
    }

    #[test]
    fn test_expand_composite_rejects_nested_objects() {
        let schema = json!({
            "type": "object",
            "properties": {"inner": {"type": "object", "properties": {}}}
        });
        let err = expand_composite("filters", &FieldSpec::header(), &schema).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NonScalarCompositeField {
                param: "filters".into(),
                field: "inner".into()
            }
        );
    }
}
