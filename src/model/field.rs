use super::schema::FieldShape;
use crate::error::{ConfigError, Issue, LocItem};
use crate::params::{FieldSpec, ParamSource};
use crate::validator_cache::ValidatorCache;
use jsonschema::JSONSchema;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A field spec compiled against its declared type.
///
/// Holds the effective JSON schema (declared type with `$ref`s expanded and the field spec's
/// constraints folded in) and the compiled validator for it. Built once at route
/// registration; `validate` is called per request and never mutates the field.
#[derive(Clone)]
pub struct ModelField {
    name: String,
    alias: String,
    spec: FieldSpec,
    schema: Value,
    shape: FieldShape,
    validator: Arc<JSONSchema>,
}

impl fmt::Debug for ModelField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelField")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("source", &self.spec.source())
            .field("shape", &self.shape)
            .field("required", &self.required())
            .field("schema", &self.schema)
            .finish()
    }
}

impl ModelField {
    /// Compile `spec` (already bound to a name) against the declared `schema`.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidSchema` when the effective schema does not compile.
    pub fn compile(
        name: &str,
        spec: FieldSpec,
        declared: &Value,
        cache: &ValidatorCache,
    ) -> Result<Self, ConfigError> {
        let spec = if spec.name().is_none() {
            spec.named(name)
        } else {
            spec
        };
        let shape = FieldShape::classify(spec.source(), declared);
        let schema = effective_schema(&spec, declared, shape);
        // Files are checked structurally; their schema is only documentation
        let validator_schema = if shape.is_file() {
            Value::Object(Map::new())
        } else {
            schema.clone()
        };
        let validator =
            cache
                .get_or_compile(&validator_schema)
                .map_err(|reason| ConfigError::InvalidSchema {
                    param: name.to_string(),
                    reason,
                })?;
        Ok(ModelField {
            name: name.to_string(),
            alias: spec.effective_alias(name),
            spec,
            schema,
            shape,
            validator,
        })
    }

    /// Synthesize a composite object field whose properties are `fields`, keyed by alias.
    pub(crate) fn composite(
        name: &str,
        spec: FieldSpec,
        fields: &[&ModelField],
        cache: &ValidatorCache,
    ) -> Result<Self, ConfigError> {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in fields {
            properties.insert(field.alias.clone(), field.schema.clone());
            if field.required() {
                required.push(Value::String(field.alias.clone()));
            }
        }
        let mut schema = Map::new();
        schema.insert("title".into(), Value::String(name.to_string()));
        schema.insert("type".into(), Value::String("object".into()));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        let spec = if fields.iter().any(|f| f.required()) {
            spec
        } else {
            spec.optional()
        };
        ModelField::compile(name, spec, &Value::Object(schema), cache)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire name the value is looked up under.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub fn source(&self) -> ParamSource {
        self.spec.source()
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn shape(&self) -> FieldShape {
        self.shape
    }

    pub fn required(&self) -> bool {
        self.spec.is_required()
    }

    pub fn default(&self) -> Option<&Value> {
        self.spec.default_value()
    }

    pub fn media_type(&self) -> Option<&str> {
        self.spec.media_type_str()
    }

    /// `(source, alias)`, the location a missing value is reported at.
    pub fn loc(&self) -> Vec<LocItem> {
        vec![
            LocItem::field(self.source().loc_tag()),
            LocItem::field(self.alias.clone()),
        ]
    }

    /// Return a copy that is looked up under its own alias inside a shared body.
    pub(crate) fn embedded(&self) -> ModelField {
        let mut field = self.clone();
        field.spec = field.spec.force_embed();
        field
    }

    /// Validate a raw value; every validator error becomes one issue under `loc`.
    pub fn validate(&self, raw: &Value, loc: &[LocItem]) -> Result<Value, Vec<Issue>> {
        match self.validator.validate(raw) {
            Ok(()) => Ok(raw.clone()),
            Err(errors) => Err(errors
                .map(|e| {
                    let mut at = loc.to_vec();
                    at.extend(pointer_to_loc(&e.instance_path.to_string()));
                    Issue::validation(at, e.to_string()).with_input(e.instance.into_owned())
                })
                .collect()),
        }
    }

    /// What an absent value resolves to: a missing-value issue if required, else the default.
    pub fn resolve_missing(&self, loc: &[LocItem]) -> Result<Value, Vec<Issue>> {
        if self.required() {
            Err(vec![Issue::missing(loc.to_vec())])
        } else {
            Ok(self.default().cloned().unwrap_or(Value::Null))
        }
    }
}

/// Build the schema the validator runs against.
fn effective_schema(spec: &FieldSpec, declared: &Value, shape: FieldShape) -> Value {
    let mut schema = match declared {
        Value::Object(m) => m.clone(),
        Value::Bool(true) | Value::Null => Map::new(),
        other => {
            let mut m = Map::new();
            m.insert("allOf".into(), Value::Array(vec![other.clone()]));
            m
        }
    };
    let constraints = spec.constraints();
    if !constraints.is_empty() && !shape.is_file() {
        if shape == FieldShape::Sequence {
            schema.extend(constraints.sequence_keywords());
            let value_kw = constraints.value_keywords();
            if !value_kw.is_empty() {
                let items = schema
                    .entry("items")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(items) = items {
                    items.extend(value_kw);
                }
            }
        } else {
            schema.extend(constraints.value_keywords());
            schema.extend(constraints.sequence_keywords());
        }
    }
    if shape.is_file() && !schema.contains_key("type") {
        schema.insert("type".into(), Value::String("string".into()));
        schema.insert("format".into(), Value::String("binary".into()));
    }
    if let Some(title) = spec.title_str() {
        schema.insert("title".into(), Value::String(title.to_string()));
    }
    if let Some(desc) = spec.description_str() {
        schema.insert("description".into(), Value::String(desc.to_string()));
    }
    if spec.is_deprecated() {
        schema.insert("deprecated".into(), Value::Bool(true));
    }
    Value::Object(schema)
}

/// `/items/0/name` -> `["items", 0, "name"]`
fn pointer_to_loc(pointer: &str) -> Vec<LocItem> {
    pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|token| {
            let token = token.replace("~1", "/").replace("~0", "~");
            match token.parse::<usize>() {
                Ok(i) => LocItem::Index(i),
                Err(_) => LocItem::Field(token),
            }
        })
        .collect()
}
