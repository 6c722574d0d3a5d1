use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Where a validated input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Cookie,
    Body,
    Form,
    File,
}

impl ParamSource {
    /// Body, Form and File all read the request body.
    pub fn is_body_like(&self) -> bool {
        matches!(self, ParamSource::Body | ParamSource::Form | ParamSource::File)
    }

    /// Media type a field of this source carries unless overridden.
    pub fn default_media_type(&self) -> Option<&'static str> {
        match self {
            ParamSource::Body => Some("application/json"),
            ParamSource::Form => Some("application/x-www-form-urlencoded"),
            ParamSource::File => Some("multipart/form-data"),
            _ => None,
        }
    }

    /// First element of an issue location for this source.
    ///
    /// Form and file inputs are part of the request body, so they report as `body`.
    pub fn loc_tag(&self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Cookie => "cookie",
            ParamSource::Body | ParamSource::Form | ParamSource::File => "body",
        }
    }
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Cookie => "cookie",
            ParamSource::Body => "body",
            ParamSource::Form => "form",
            ParamSource::File => "file",
        };
        f.write_str(s)
    }
}

/// Length, numeric and pattern constraints declared on a field.
///
/// These are folded into the field's JSON schema when the model field is compiled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Constraints {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
    pub multiple_of: Option<f64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }

    /// Keywords that apply to a single value (string or number).
    pub fn value_keywords(&self) -> Map<String, Value> {
        let mut m = Map::new();
        if let Some(v) = self.min_length {
            m.insert("minLength".into(), Value::from(v));
        }
        if let Some(v) = self.max_length {
            m.insert("maxLength".into(), Value::from(v));
        }
        if let Some(p) = &self.pattern {
            m.insert("pattern".into(), Value::String(p.clone()));
        }
        if let Some(v) = self.gt {
            m.insert("exclusiveMinimum".into(), Value::from(v));
        }
        if let Some(v) = self.ge {
            m.insert("minimum".into(), Value::from(v));
        }
        if let Some(v) = self.lt {
            m.insert("exclusiveMaximum".into(), Value::from(v));
        }
        if let Some(v) = self.le {
            m.insert("maximum".into(), Value::from(v));
        }
        if let Some(v) = self.multiple_of {
            m.insert("multipleOf".into(), Value::from(v));
        }
        m
    }

    /// Keywords that apply to a sequence.
    pub fn sequence_keywords(&self) -> Map<String, Value> {
        let mut m = Map::new();
        if let Some(v) = self.min_items {
            m.insert("minItems".into(), Value::from(v));
        }
        if let Some(v) = self.max_items {
            m.insert("maxItems".into(), Value::from(v));
        }
        m
    }
}

/// Declarative description of one validated input.
///
/// Built with one of the source constructors and then refined:
///
/// ```rust
/// use brrtrouter_args::params::{FieldSpec, ParamSource};
/// use serde_json::json;
///
/// let limit = FieldSpec::query().default(json!(10)).ge(1.0).le(100.0);
/// assert_eq!(limit.source(), ParamSource::Query);
/// assert!(!limit.is_required());
///
/// let token = FieldSpec::header();
/// assert_eq!(token.effective_alias("x_token"), "x-token");
/// ```
///
/// The media type is only ever set on body, form and file fields, and a field has
/// exactly one source; the constructors are the only way to pick it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    source: ParamSource,
    name: Option<String>,
    alias: Option<String>,
    default: Option<Value>,
    constraints: Constraints,
    media_type: Option<String>,
    embed: bool,
    convert_underscores: bool,
    title: Option<String>,
    description: Option<String>,
    deprecated: bool,
    include_in_schema: bool,
}

impl FieldSpec {
    fn with_source(source: ParamSource) -> Self {
        FieldSpec {
            source,
            name: None,
            alias: None,
            default: None,
            constraints: Constraints::default(),
            media_type: source.default_media_type().map(str::to_string),
            embed: false,
            convert_underscores: source == ParamSource::Header,
            title: None,
            description: None,
            deprecated: false,
            include_in_schema: true,
        }
    }

    pub fn path() -> Self {
        FieldSpec::with_source(ParamSource::Path)
    }

    pub fn query() -> Self {
        FieldSpec::with_source(ParamSource::Query)
    }

    pub fn header() -> Self {
        FieldSpec::with_source(ParamSource::Header)
    }

    pub fn cookie() -> Self {
        FieldSpec::with_source(ParamSource::Cookie)
    }

    pub fn body() -> Self {
        FieldSpec::with_source(ParamSource::Body)
    }

    pub fn form() -> Self {
        FieldSpec::with_source(ParamSource::Form)
    }

    pub fn file() -> Self {
        FieldSpec::with_source(ParamSource::File)
    }

    /// Default used when the value is absent; makes the field optional.
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Optional with a `null` default.
    pub fn optional(self) -> Self {
        self.default(Value::Null)
    }

    /// Required sentinel: clears any default.
    pub fn required(mut self) -> Self {
        self.default = None;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Headers only: derive the wire name by turning `_` into `-`.
    pub fn convert_underscores(mut self, convert: bool) -> Self {
        if self.source == ParamSource::Header {
            self.convert_underscores = convert;
        }
        self
    }

    /// Body only: nest the value under its alias instead of binding the whole body.
    pub fn embed(mut self, embed: bool) -> Self {
        if self.source == ParamSource::Body {
            self.embed = embed;
        }
        self
    }

    /// Body-like fields only.
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        if self.source.is_body_like() {
            self.media_type = Some(media_type.into());
        }
        self
    }

    pub fn min_length(mut self, v: u64) -> Self {
        self.constraints.min_length = Some(v);
        self
    }

    pub fn max_length(mut self, v: u64) -> Self {
        self.constraints.max_length = Some(v);
        self
    }

    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        self.constraints.pattern = Some(regex.into());
        self
    }

    pub fn gt(mut self, v: f64) -> Self {
        self.constraints.gt = Some(v);
        self
    }

    pub fn ge(mut self, v: f64) -> Self {
        self.constraints.ge = Some(v);
        self
    }

    pub fn lt(mut self, v: f64) -> Self {
        self.constraints.lt = Some(v);
        self
    }

    pub fn le(mut self, v: f64) -> Self {
        self.constraints.le = Some(v);
        self
    }

    pub fn multiple_of(mut self, v: f64) -> Self {
        self.constraints.multiple_of = Some(v);
        self
    }

    pub fn min_items(mut self, v: u64) -> Self {
        self.constraints.min_items = Some(v);
        self
    }

    pub fn max_items(mut self, v: u64) -> Self {
        self.constraints.max_items = Some(v);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    /// Bind this field spec to a parameter name. Done once by signature inspection.
    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Drop any default. Path parameters are always taken from the URL.
    pub(crate) fn without_default(mut self) -> Self {
        self.default = None;
        self
    }

    pub(crate) fn force_embed(mut self) -> Self {
        self.embed = true;
        self
    }

    pub fn source(&self) -> ParamSource {
        self.source
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn explicit_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Wire name for a parameter called `name`.
    pub fn effective_alias(&self, name: &str) -> String {
        match &self.alias {
            Some(a) => a.clone(),
            None if self.source == ParamSource::Header && self.convert_underscores => {
                name.replace('_', "-")
            }
            None => name.to_string(),
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Path fields are always required; everything else is required iff it has no default.
    pub fn is_required(&self) -> bool {
        self.source == ParamSource::Path || self.default.is_none()
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn media_type_str(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn is_embedded(&self) -> bool {
        self.embed
    }

    pub fn converts_underscores(&self) -> bool {
        self.convert_underscores
    }

    pub fn title_str(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description_str(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn is_included_in_schema(&self) -> bool {
        self.include_in_schema
    }
}
