use super::route::RouteTemplate;
use crate::context::{ContextKind, ServiceKey};
use crate::error::ConfigError;
use crate::model::{expand_composite, expand_schema_refs, is_object, SchemaNamespace};
use crate::params::{FieldSpec, ParamSource};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Declared type of a handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Inline JSON schema, possibly containing `$ref`s into the namespace
    Schema(Value),
    /// Forward reference by type name, resolved against the namespace
    Named(String),
}

impl From<Value> for TypeRef {
    fn from(schema: Value) -> Self {
        TypeRef::Schema(schema)
    }
}

/// What a parameter declares as its default.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamDefault {
    #[default]
    None,
    /// Plain value: the parameter is an optional query parameter
    Literal(Value),
    /// Source marker with its configuration
    Field(FieldSpec),
    /// Supplied by the service provider
    Injected(ServiceKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    #[default]
    Positional,
    /// Catch-all positional list
    VarPositional,
    /// Catch-all keyword map
    VarKeyword,
}

/// One parameter of a handler signature, as registered.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredParam {
    pub name: String,
    pub annotation: Option<TypeRef>,
    pub default: ParamDefault,
    pub kind: ParamKind,
}

impl DeclaredParam {
    pub fn new(name: impl Into<String>, annotation: impl Into<TypeRef>) -> Self {
        DeclaredParam {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: ParamDefault::None,
            kind: ParamKind::Positional,
        }
    }

    /// A parameter with no declared type.
    pub fn untyped(name: impl Into<String>) -> Self {
        DeclaredParam {
            name: name.into(),
            annotation: None,
            default: ParamDefault::None,
            kind: ParamKind::Positional,
        }
    }

    /// Forward reference to a namespace type.
    pub fn named(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        DeclaredParam::new(name, TypeRef::Named(type_name.into()))
    }

    pub fn variadic(name: impl Into<String>, kind: ParamKind) -> Self {
        DeclaredParam {
            kind,
            ..DeclaredParam::untyped(name)
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.default = ParamDefault::Field(spec);
        self
    }

    pub fn literal(mut self, value: Value) -> Self {
        self.default = ParamDefault::Literal(value);
        self
    }

    pub fn injected(mut self, key: ServiceKey) -> Self {
        self.default = ParamDefault::Injected(key);
        self
    }
}

/// A handler's name, its declared parameters in order, and the namespace its types
/// are defined in.
///
/// ```rust
/// use brrtrouter_args::params::FieldSpec;
/// use brrtrouter_args::signature::{DeclaredParam, HandlerSignature};
/// use serde_json::json;
///
/// let sig = HandlerSignature::new("update_item")
///     .param(DeclaredParam::new("id", json!({"type": "integer"})).field(FieldSpec::path()))
///     .param(DeclaredParam::new("q", json!({"type": "string"})).literal(json!("x")));
/// assert_eq!(sig.params().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandlerSignature {
    name: String,
    params: Vec<DeclaredParam>,
    namespace: SchemaNamespace,
}

impl HandlerSignature {
    pub fn new(name: impl Into<String>) -> Self {
        HandlerSignature {
            name: name.into(),
            ..HandlerSignature::default()
        }
    }

    pub fn param(mut self, param: DeclaredParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn namespace(mut self, namespace: SchemaNamespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[DeclaredParam] {
        &self.params
    }

    pub fn schema_namespace(&self) -> &SchemaNamespace {
        &self.namespace
    }
}

/// A classified parameter, ready to be compiled into model fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDescriptor {
    /// One field read from one source
    Field {
        name: String,
        spec: FieldSpec,
        schema: Value,
    },
    /// An object-typed query/header/cookie parameter expanded into one field per property
    Composite {
        name: String,
        spec: FieldSpec,
        schema: Value,
        children: Vec<(FieldSpec, Value)>,
    },
    Injected { name: String, key: ServiceKey },
    Context { name: String, kind: ContextKind },
}

impl ParamDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ParamDescriptor::Field { name, .. }
            | ParamDescriptor::Composite { name, .. }
            | ParamDescriptor::Injected { name, .. }
            | ParamDescriptor::Context { name, .. } => name,
        }
    }

    /// Source of a field or composite descriptor.
    pub fn source(&self) -> Option<ParamSource> {
        match self {
            ParamDescriptor::Field { spec, .. } | ParamDescriptor::Composite { spec, .. } => {
                Some(spec.source())
            }
            _ => None,
        }
    }
}

/// Classify every parameter of `sig` against the route `template`.
///
/// Parameters are visited in declaration order:
///
/// 1. Catch-all parameters and an untyped `self` are skipped
/// 2. `request`, `websocket` and `context` without a default bind the connection
/// 3. An injected default binds a service
/// 4. A name in the template is a path parameter, whatever its default says
/// 5. Otherwise a source marker keeps its source and anything else is a query
///    parameter; object-typed query, header and cookie parameters are expanded
///
/// # Errors
///
/// Any [`ConfigError`]: unresolved types, a `Path` marker on a name the route does not
/// have, composite properties that are not scalars, or duplicate names.
pub fn inspect(
    sig: &HandlerSignature,
    template: &RouteTemplate,
) -> Result<Vec<ParamDescriptor>, ConfigError> {
    let mut out = Vec::with_capacity(sig.params.len());
    let mut seen = HashSet::new();

    for param in &sig.params {
        if param.kind != ParamKind::Positional {
            continue;
        }
        if param.name == "self" && param.annotation.is_none() {
            continue;
        }
        if !seen.insert(param.name.as_str()) {
            return Err(ConfigError::DuplicateParam {
                param: param.name.clone(),
            });
        }

        if param.default == ParamDefault::None {
            if let Some(kind) = ContextKind::from_param_name(&param.name) {
                out.push(ParamDescriptor::Context {
                    name: param.name.clone(),
                    kind,
                });
                continue;
            }
        }
        if let ParamDefault::Injected(key) = &param.default {
            out.push(ParamDescriptor::Injected {
                name: param.name.clone(),
                key: *key,
            });
            continue;
        }

        let schema = resolve_annotation(sig, param)?;
        let descriptor = classify(param, schema, template)?;
        debug!(
            handler = %sig.name,
            param = %param.name,
            source = ?descriptor.source(),
            "Classified handler parameter"
        );
        out.push(descriptor);
    }
    Ok(out)
}

fn resolve_annotation(sig: &HandlerSignature, param: &DeclaredParam) -> Result<Value, ConfigError> {
    let unresolved = |type_name: String| ConfigError::UnresolvedType {
        param: param.name.clone(),
        type_name,
    };
    let mut schema = match &param.annotation {
        None => Value::Object(Default::default()),
        Some(TypeRef::Schema(s)) => s.clone(),
        Some(TypeRef::Named(n)) => {
            let mut s = sig
                .namespace
                .get(n)
                .cloned()
                .ok_or_else(|| unresolved(n.clone()))?;
            if let Value::Object(o) = &mut s {
                o.entry("x-ref-name").or_insert_with(|| Value::String(n.clone()));
            }
            s
        }
    };
    expand_schema_refs(&sig.namespace, &mut schema).map_err(unresolved)?;
    Ok(schema)
}

fn classify(
    param: &DeclaredParam,
    schema: Value,
    template: &RouteTemplate,
) -> Result<ParamDescriptor, ConfigError> {
    let name = param.name.as_str();

    if template.contains(name) {
        let spec = match &param.default {
            ParamDefault::Field(s) if s.source() == ParamSource::Path => s.clone(),
            _ => FieldSpec::path(),
        };
        return Ok(ParamDescriptor::Field {
            name: name.to_string(),
            spec: spec.without_default().named(name),
            schema,
        });
    }

    let spec = match &param.default {
        ParamDefault::Field(s) if s.source() == ParamSource::Path => {
            return Err(ConfigError::UnknownPathParam {
                param: name.to_string(),
                route: template.path().to_string(),
            });
        }
        ParamDefault::Field(s) => s.clone(),
        ParamDefault::Literal(v) => FieldSpec::query().default(v.clone()),
        ParamDefault::None | ParamDefault::Injected(_) => FieldSpec::query(),
    }
    .named(name);

    let expands = matches!(
        spec.source(),
        ParamSource::Query | ParamSource::Header | ParamSource::Cookie
    ) && is_object(&schema);
    if expands {
        let children = expand_composite(name, &spec, &schema)?;
        return Ok(ParamDescriptor::Composite {
            name: name.to_string(),
            spec,
            schema,
            children,
        });
    }

    Ok(ParamDescriptor::Field {
        name: name.to_string(),
        spec,
        schema,
    })
}
