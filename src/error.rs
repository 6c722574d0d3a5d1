//! # Error Module
//!
//! Error taxonomy for parameter resolution.
//!
//! Two families live here and they never mix:
//!
//! - **Request time**: [`Issue`]s collected by an [`ErrorAggregator`] across every
//!   resolver of an endpoint and handed back as one [`ValidationErrors`] list. Only a
//!   body that cannot be decoded at all stops the other resolvers from running.
//! - **Registration time**: [`ConfigError`], raised while an endpoint's argument model
//!   is being built. These abort route registration and are never seen per request.
//!
//! Issue locations follow the `(source, field, index, ...)` tuple convention, so a
//! client sees `["query", "limit"]` or `["body", "items", 0, "name"]`.

use crate::context::multipart::MultipartError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// One element of an issue location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocItem {
    /// Field name or source tag
    Field(String),
    /// Position inside a sequence
    Index(usize),
}

impl LocItem {
    /// Create a field location item.
    pub fn field(name: impl Into<String>) -> Self {
        LocItem::Field(name.into())
    }

    /// Create an index location item.
    pub fn index(idx: usize) -> Self {
        LocItem::Index(idx)
    }

    /// Field name, if this is a `Field`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LocItem::Field(s) => Some(s),
            LocItem::Index(_) => None,
        }
    }
}

impl From<&str> for LocItem {
    fn from(s: &str) -> Self {
        LocItem::Field(s.to_string())
    }
}

impl From<String> for LocItem {
    fn from(s: String) -> Self {
        LocItem::Field(s)
    }
}

impl From<usize> for LocItem {
    fn from(i: usize) -> Self {
        LocItem::Index(i)
    }
}

impl fmt::Display for LocItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocItem::Field(s) => write!(f, "{}", s),
            LocItem::Index(i) => write!(f, "{}", i),
        }
    }
}

impl Serialize for LocItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LocItem::Field(s) => serializer.serialize_str(s),
            LocItem::Index(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

/// Build a location from a source tag and a path of items.
///
/// ```rust
/// use brrtrouter_args::error::{loc, LocItem};
///
/// let l = loc("query", ["limit"]);
/// assert_eq!(l, vec![LocItem::field("query"), LocItem::field("limit")]);
/// ```
pub fn loc<I, T>(source: &str, rest: I) -> Vec<LocItem>
where
    I: IntoIterator<Item = T>,
    T: Into<LocItem>,
{
    let mut out = vec![LocItem::field(source)];
    out.extend(rest.into_iter().map(Into::into));
    out
}

/// What went wrong with one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// A required field is absent from its source
    MissingRequiredValue,
    /// The value is present but fails type or constraint validation
    ValidationFailure,
    /// The body could not be decoded per its media type
    BodyParseFailure,
}

impl IssueKind {
    /// Wire identifier used in the `type` member of a serialized issue.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::MissingRequiredValue => "missing",
            IssueKind::ValidationFailure => "validation_error",
            IssueKind::BodyParseFailure => "json_invalid",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single located validation issue.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub kind: IssueKind,
    pub loc: Vec<LocItem>,
    pub msg: String,
    pub input: Option<Value>,
}

impl Issue {
    pub fn new(kind: IssueKind, loc: Vec<LocItem>, msg: impl Into<String>) -> Self {
        Issue {
            kind,
            loc,
            msg: msg.into(),
            input: None,
        }
    }

    /// `Field required` at `loc`.
    pub fn missing(loc: Vec<LocItem>) -> Self {
        Issue::new(IssueKind::MissingRequiredValue, loc, "Field required")
    }

    pub fn validation(loc: Vec<LocItem>, msg: impl Into<String>) -> Self {
        Issue::new(IssueKind::ValidationFailure, loc, msg)
    }

    pub fn body_parse(loc: Vec<LocItem>, msg: impl Into<String>) -> Self {
        Issue::new(IssueKind::BodyParseFailure, loc, msg)
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn is_body_parse(&self) -> bool {
        self.kind == IssueKind::BodyParseFailure
    }

    /// Dotted rendering of the location, e.g. `body.items.0.name`.
    pub fn loc_string(&self) -> String {
        self.loc
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.loc_string(), self.msg)
    }
}

impl Serialize for Issue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.input.is_some() { 4 } else { 3 };
        let mut st = serializer.serialize_struct("Issue", len)?;
        st.serialize_field("type", self.kind.as_str())?;
        st.serialize_field("loc", &self.loc)?;
        st.serialize_field("msg", &self.msg)?;
        if let Some(input) = &self.input {
            st.serialize_field("input", input)?;
        }
        st.end()
    }
}

/// Every issue found while resolving one request, in resolver order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationErrors {
    issues: Vec<Issue>,
}

impl ValidationErrors {
    pub fn new(issues: Vec<Issue>) -> Self {
        ValidationErrors { issues }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// True when the request body itself could not be decoded.
    pub fn has_body_parse_failure(&self) -> bool {
        self.issues.iter().any(Issue::is_body_parse)
    }

    /// `{"detail": [...]}` payload for a validation error response.
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "detail": self.issues })
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("ValidationErrors", 1)?;
        st.serialize_field("detail", &self.issues)?;
        st.end()
    }
}

/// Collects issues from independent resolvers into one ordered list.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    issues: Vec<Issue>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        ErrorAggregator::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn has_body_parse_failure(&self) -> bool {
        self.issues.iter().any(Issue::is_body_parse)
    }

    /// `Ok(value)` when nothing was collected, otherwise every collected issue.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(ValidationErrors::new(self.issues))
        }
    }
}

/// Request-time failure returned by `EndpointArgsModel::resolve_dependencies`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// One or more inputs are missing, malformed, or invalid
    Invalid(ValidationErrors),
    /// The service provider could not supply an injected parameter
    Service {
        /// Parameter name on the handler
        param: String,
        /// Type the parameter was declared with
        type_name: String,
    },
    /// The argument model is unusable (e.g. never built)
    Config(ConfigError),
}

impl ResolveError {
    /// HTTP status the dispatcher should answer with.
    ///
    /// An undecodable body is a plain 400; field-level issues are 422.
    pub fn status_code(&self) -> u16 {
        match self {
            ResolveError::Invalid(errs) if errs.has_body_parse_failure() => 400,
            ResolveError::Invalid(_) => 422,
            ResolveError::Service { .. } | ResolveError::Config(_) => 500,
        }
    }

    /// The aggregated issues, if this is a validation failure.
    pub fn issues(&self) -> &[Issue] {
        match self {
            ResolveError::Invalid(errs) => errs.issues(),
            ResolveError::Service { .. } | ResolveError::Config(_) => &[],
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Invalid(errs) => write!(f, "request validation failed: {}", errs),
            ResolveError::Service { param, type_name } => write!(
                f,
                "no service registered for parameter '{}' of type {}",
                param, type_name
            ),
            ResolveError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<ConfigError> for ResolveError {
    fn from(e: ConfigError) -> Self {
        ResolveError::Config(e)
    }
}

impl From<ValidationErrors> for ResolveError {
    fn from(errs: ValidationErrors) -> Self {
        ResolveError::Invalid(errs)
    }
}

/// Registration-time misconfiguration of a handler parameter.
///
/// Returned by signature inspection, resolver creation and model building. The
/// route must not be registered when any of these is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A named type could not be found in the handler's schema namespace
    UnresolvedType { param: String, type_name: String },
    /// A parameter declared as `Path` does not appear in the route template
    UnknownPathParam { param: String, route: String },
    /// A path or cookie parameter with a sequence or object type
    NonScalarParam { param: String, source: String },
    /// A property of an expanded composite parameter that is not a scalar or scalar sequence
    NonScalarCompositeField { param: String, field: String },
    /// A WebSocket body field while extra-handler mode is disabled
    WebSocketBodyDisabled { param: String },
    /// A source that the endpoint kind cannot provide
    UnsupportedSource { param: String, source: String },
    /// The effective schema does not compile
    InvalidSchema { param: String, reason: String },
    /// Two parameters resolve to the same name
    DuplicateParam { param: String },
    /// `resolve_dependencies` called before `build_model`
    NotBuilt { handler: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnresolvedType { param, type_name } => write!(
                f,
                "parameter '{}': type '{}' is not defined in the handler namespace",
                param, type_name
            ),
            ConfigError::UnknownPathParam { param, route } => write!(
                f,
                "parameter '{}' is declared as a path parameter but route '{}' has no {{{}}} placeholder",
                param, route, param
            ),
            ConfigError::NonScalarParam { param, source } => write!(
                f,
                "{} parameter '{}' must be a scalar",
                source, param
            ),
            ConfigError::NonScalarCompositeField { param, field } => write!(
                f,
                "parameter '{}': field '{}' must be a scalar or a sequence of scalars",
                param, field
            ),
            ConfigError::WebSocketBodyDisabled { param } => write!(
                f,
                "parameter '{}': WebSocket body fields require extra-handler mode (BRRTR_WS_EXTRA_HANDLERS)",
                param
            ),
            ConfigError::UnsupportedSource { param, source } => write!(
                f,
                "parameter '{}': source '{}' is not available on this endpoint",
                param, source
            ),
            ConfigError::InvalidSchema { param, reason } => {
                write!(f, "parameter '{}': invalid schema: {}", param, reason)
            }
            ConfigError::DuplicateParam { param } => {
                write!(f, "parameter '{}' is declared more than once", param)
            }
            ConfigError::NotBuilt { handler } => write!(
                f,
                "argument model for '{}' was used before build_model()",
                handler
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure reading or decoding the request body from the connection.
///
/// Resolvers surface these as a `BodyParseFailure` issue at `("body",)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Body exceeds `BRRTR_MAX_BODY_BYTES`
    BodyTooLarge { size: usize, max: usize },
    Multipart(MultipartError),
    /// The underlying stream failed
    Read(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::BodyTooLarge { size, max } => write!(
                f,
                "request body is {} bytes, limit is {}",
                size, max
            ),
            TransportError::Multipart(e) => write!(f, "{}", e),
            TransportError::Read(msg) => write!(f, "failed to read request body: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Multipart(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MultipartError> for TransportError {
    fn from(e: MultipartError) -> Self {
        TransportError::Multipart(e)
    }
}

impl TransportError {
    /// The issue a resolver reports for this failure.
    pub fn to_issue(&self) -> Issue {
        Issue::body_parse(vec![LocItem::field("body")], self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issue_serializes_like_fastapi() {
        let issue = Issue::missing(loc("query", ["q"]));
        let v = serde_json::to_value(&issue).unwrap();
        assert_eq!(v, json!({"type": "missing", "loc": ["query", "q"], "msg": "Field required"}));
    }

    #[test]
    fn test_index_loc_serializes_as_number() {
        let issue = Issue::validation(
            vec![LocItem::field("body"), LocItem::field("items"), LocItem::index(0)],
            "bad",
        )
        .with_input(json!("x"));
        let v = serde_json::to_value(&issue).unwrap();
        assert_eq!(v["loc"], json!(["body", "items", 0]));
        assert_eq!(v["input"], json!("x"));
        assert_eq!(issue.loc_string(), "body.items.0");
    }

    #[test]
    fn test_aggregator_finish() {
        let agg = ErrorAggregator::new();
        assert_eq!(agg.finish(5).unwrap(), 5);

        let mut agg = ErrorAggregator::new();
        agg.push(Issue::missing(loc("header", ["x-token"])));
        agg.extend(vec![Issue::missing(loc("query", ["a"]))]);
        let errs = agg.finish(()).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs.issues()[1].loc_string(), "query.a");
    }

    #[test]
    fn test_status_codes() {
        let parse = ResolveError::Invalid(ValidationErrors::new(vec![Issue::body_parse(
            loc("body", [LocItem::index(3)]),
            "JSON decode error",
        )]));
        assert_eq!(parse.status_code(), 400);
        let missing = ResolveError::Invalid(ValidationErrors::new(vec![Issue::missing(loc(
            "path",
            ["id"],
        ))]));
        assert_eq!(missing.status_code(), 422);
        let svc = ResolveError::Service {
            param: "db".into(),
            type_name: "Db".into(),
        };
        assert_eq!(svc.status_code(), 500);
        assert!(svc.issues().is_empty());
    }
}
