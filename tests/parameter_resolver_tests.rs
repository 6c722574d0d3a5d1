mod common;

use brrtrouter_args::context::{HttpConnection, RequestContext};
use brrtrouter_args::error::{loc, ConfigError, IssueKind, ResolveError};
use brrtrouter_args::model::ModelField;
use brrtrouter_args::params::FieldSpec;
use brrtrouter_args::resolvers::{
    CookieParameterResolver, HeaderParameterResolver, QueryParameterResolver, Resolver,
};
use brrtrouter_args::signature::{DeclaredParam, HandlerSignature, SchemaNamespace};
use brrtrouter_args::validator_cache::ValidatorCache;
use brrtrouter_args::args::{BuildOptions, EndpointArgsModel};
use common::fixtures::{build, integer, string, string_list};
use serde_json::{json, Value};

fn field(name: &str, spec: FieldSpec, schema: Value) -> ModelField {
    ModelField::compile(name, spec, &schema, &ValidatorCache::new(true)).unwrap()
}

async fn resolve_one(resolver: &dyn Resolver, ctx: &dyn RequestContext) -> Value {
    let values = resolver.resolve(ctx).await.unwrap();
    values
        .values()
        .next()
        .and_then(|v| v.as_json())
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn test_header_alias_converts_underscores() {
    let r = HeaderParameterResolver::new(field("x_token", FieldSpec::header(), string()));
    let conn = HttpConnection::builder().header("X-Token", "secret").build();
    assert_eq!(resolve_one(&r, &conn).await, json!("secret"));
}

#[tokio::test]
async fn test_header_without_underscore_conversion() {
    let spec = FieldSpec::header().convert_underscores(false);
    let r = HeaderParameterResolver::new(field("x_token", spec, string()));
    let conn = HttpConnection::builder().header("x-token", "secret").build();
    let issues = r.resolve(&conn).await.unwrap_err();
    assert_eq!(issues[0].loc, loc("header", ["x_token"]));
}

#[tokio::test]
async fn test_header_sequence_and_first_wins() {
    let list = HeaderParameterResolver::new(field("x_tag", FieldSpec::header(), string_list()));
    let one = HeaderParameterResolver::new(field("x_tag", FieldSpec::header(), string()));
    let conn = HttpConnection::builder()
        .header("x-tag", "a")
        .header("x-tag", "b")
        .build();
    assert_eq!(resolve_one(&list, &conn).await, json!(["a", "b"]));
    assert_eq!(resolve_one(&one, &conn).await, json!("a"));
}

#[tokio::test]
async fn test_query_last_wins_and_decodes() {
    let r = QueryParameterResolver::new(field("page", FieldSpec::query(), integer()));
    let conn = HttpConnection::builder().query_string("page=1&page=3").build();
    assert_eq!(resolve_one(&r, &conn).await, json!(3));

    let r = QueryParameterResolver::new(field("flag", FieldSpec::query(), json!({"type": "boolean"})));
    let conn = HttpConnection::builder().query_string("flag=on").build();
    assert_eq!(resolve_one(&r, &conn).await, json!(true));
}

#[tokio::test]
async fn test_query_constraints_and_alias() {
    let spec = FieldSpec::query().alias("pageSize").ge(1.0).le(100.0);
    let r = QueryParameterResolver::new(field("page_size", spec, integer()));

    let conn = HttpConnection::builder().query_string("pageSize=20").build();
    let values = r.resolve(&conn).await.unwrap();
    assert_eq!(values.get("page_size").and_then(|v| v.as_json()), Some(&json!(20)));

    let conn = HttpConnection::builder().query_string("pageSize=500").build();
    let issues = r.resolve(&conn).await.unwrap_err();
    assert_eq!(issues[0].kind, IssueKind::ValidationFailure);
    assert_eq!(issues[0].loc, loc("query", ["pageSize"]));
    assert_eq!(issues[0].input, Some(json!(500)));
}

#[tokio::test]
async fn test_optional_query_uses_default() {
    let r = QueryParameterResolver::new(field("limit", FieldSpec::query().default(json!(10)), integer()));
    let conn = HttpConnection::builder().build();
    assert_eq!(resolve_one(&r, &conn).await, json!(10));
}

#[tokio::test]
async fn test_cookie_from_header_is_percent_decoded() {
    let r = CookieParameterResolver::new(field("session", FieldSpec::cookie(), string()));
    let conn = HttpConnection::builder()
        .header("cookie", "theme=dark; session=a%20b")
        .build();
    assert_eq!(resolve_one(&r, &conn).await, json!("a b"));

    let conn = HttpConnection::builder().build();
    let issues = r.resolve(&conn).await.unwrap_err();
    assert_eq!(issues[0].loc, loc("cookie", ["session"]));
}

fn filter_namespace() -> SchemaNamespace {
    SchemaNamespace::new().with(
        "Filter",
        json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": ["open", "closed"]},
                "limit": {"type": "integer", "default": 10},
                "tag": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["status"]
        }),
    )
}

#[tokio::test]
async fn test_object_query_parameter_is_expanded() {
    let sig = HandlerSignature::new("list")
        .namespace(filter_namespace())
        .param(DeclaredParam::named("filter", "Filter").field(FieldSpec::query()));
    let model = build(sig, "/issues");

    let names: Vec<&str> = model.get_all_models().iter().map(|m| m.name()).collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"status"));

    let conn = HttpConnection::builder()
        .path("/issues?status=open&tag=a&tag=b")
        .build();
    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(
        kwargs.json("filter"),
        Some(&json!({"status": "open", "limit": 10, "tag": ["a", "b"]}))
    );
}

#[tokio::test]
async fn test_expanded_children_report_their_own_issues() {
    let sig = HandlerSignature::new("list")
        .namespace(filter_namespace())
        .param(DeclaredParam::named("filter", "Filter").field(FieldSpec::query()));
    let model = build(sig, "/issues");

    let conn = HttpConnection::builder().path("/issues?limit=abc").build();
    let err = model.resolve_dependencies(&conn).await.unwrap_err();
    let locs: Vec<String> = err.issues().iter().map(|i| i.loc_string()).collect();
    assert_eq!(locs.len(), 2);
    assert!(locs.contains(&"query.status".to_string()));
    assert!(locs.contains(&"query.limit".to_string()));

    // children pass, parent schema rejects the enum value
    let conn = HttpConnection::builder().path("/issues?status=pending").build();
    let err = model.resolve_dependencies(&conn).await.unwrap_err();
    assert_eq!(err.issues()[0].loc[0].as_str(), Some("query"));
}

#[tokio::test]
async fn test_object_header_parameter_inherits_underscore_conversion() {
    let ns = SchemaNamespace::new().with(
        "Trace",
        json!({
            "type": "object",
            "properties": {"x_request_id": {"type": "string"}},
            "required": ["x_request_id"]
        }),
    );
    let sig = HandlerSignature::new("traced")
        .namespace(ns)
        .param(DeclaredParam::named("trace", "Trace").field(FieldSpec::header()));
    let model = build(sig, "/");
    let conn = HttpConnection::builder()
        .path("/")
        .header("X-Request-Id", "r-1")
        .build();
    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.json("trace"), Some(&json!({"x_request_id": "r-1"})));
}

#[test]
fn test_nested_object_in_expanded_parameter_is_rejected() {
    let sig = HandlerSignature::new("bad").param(
        DeclaredParam::new(
            "filter",
            json!({"type": "object", "properties": {"range": {"type": "object"}}}),
        )
        .field(FieldSpec::query()),
    );
    let err = EndpointArgsModel::build(sig, "/", BuildOptions::default()).unwrap_err();
    assert_eq!(
        err,
        ConfigError::NonScalarCompositeField {
            param: "filter".into(),
            field: "range".into()
        }
    );
}

#[test]
fn test_sequence_cookie_is_rejected() {
    let sig = HandlerSignature::new("bad")
        .param(DeclaredParam::new("ids", string_list()).field(FieldSpec::cookie()));
    let err = EndpointArgsModel::build(sig, "/", BuildOptions::default()).unwrap_err();
    assert!(matches!(err, ConfigError::NonScalarParam { .. }));
}

#[tokio::test]
async fn test_issue_order_groups_sources() {
    let sig = HandlerSignature::new("many")
        .param(DeclaredParam::new("q", string()))
        .param(DeclaredParam::new("session", string()).field(FieldSpec::cookie()))
        .param(DeclaredParam::new("x_token", string()).field(FieldSpec::header()));
    let model = build(sig, "/");
    let conn = HttpConnection::builder().path("/").build();
    let err = model.resolve_dependencies(&conn).await.unwrap_err();
    assert!(matches!(err, ResolveError::Invalid(_)));
    let locs: Vec<String> = err.issues().iter().map(|i| i.loc_string()).collect();
    assert_eq!(locs, vec!["header.x-token", "query.q", "cookie.session"]);
}
