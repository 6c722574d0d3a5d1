mod common;

use brrtrouter_args::context::HttpConnection;
use brrtrouter_args::error::{loc, IssueKind, LocItem, ResolveError};
use brrtrouter_args::params::FieldSpec;
use brrtrouter_args::signature::{DeclaredParam, HandlerSignature};
use common::fixtures::{build, integer, item_namespace, string, string_list, update_item_model};
use http::Method;
use serde_json::json;

fn issues(err: ResolveError) -> Vec<brrtrouter_args::Issue> {
    match err {
        ResolveError::Invalid(errs) => errs.into_issues(),
        other => panic!("expected validation errors, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_required_queries_are_all_reported_in_order() {
    let sig = HandlerSignature::new("search")
        .param(DeclaredParam::new("a", string()))
        .param(DeclaredParam::new("b", integer()))
        .param(DeclaredParam::new("c", string()));
    let model = build(sig, "/search");
    let conn = HttpConnection::builder().path("/search").build();

    let issues = issues(model.resolve_dependencies(&conn).await.unwrap_err());
    assert_eq!(issues.len(), 3);
    assert!(issues.iter().all(|i| i.kind == IssueKind::MissingRequiredValue));
    let locs: Vec<String> = issues.iter().map(|i| i.loc_string()).collect();
    assert_eq!(locs, vec!["query.a", "query.b", "query.c"]);
}

#[tokio::test]
async fn test_malformed_body_hides_other_issues() {
    let sig = HandlerSignature::new("create")
        .namespace(item_namespace())
        .param(DeclaredParam::new("x_token", string()).field(FieldSpec::header()))
        .param(DeclaredParam::named("item", "Item").field(FieldSpec::body()));
    let model = build(sig, "/items");
    let conn = HttpConnection::builder()
        .method(Method::POST)
        .path("/items")
        .header("content-type", "application/json")
        .body("{\"name\": ")
        .build();

    let err = model.resolve_dependencies(&conn).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    let issues = issues(err);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::BodyParseFailure);
    assert_eq!(issues[0].loc[0], LocItem::field("body"));
    assert!(matches!(issues[0].loc[1], LocItem::Index(_)));
}

#[tokio::test]
async fn test_body_read_once_for_two_json_fields() {
    let sig = HandlerSignature::new("pair")
        .param(DeclaredParam::new("x", integer()).field(FieldSpec::body()))
        .param(DeclaredParam::new("y", integer()).field(FieldSpec::body()));
    let model = build(sig, "/pair");
    let conn = HttpConnection::builder()
        .method(Method::POST)
        .path("/pair")
        .json(&json!({"x": 1, "y": 2}))
        .build();

    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.get::<i64>("x").unwrap(), 1);
    assert_eq!(kwargs.get::<i64>("y").unwrap(), 2);
    assert_eq!(conn.body_reads(), 1);
}

#[tokio::test]
async fn test_body_read_once_for_mixed_body_and_form_fields() {
    let sig = HandlerSignature::new("mixed")
        .param(DeclaredParam::new("x", string()).field(FieldSpec::body()))
        .param(DeclaredParam::new("y", string()).field(FieldSpec::form()));
    let model = build(sig, "/mixed");
    let conn = HttpConnection::builder()
        .method(Method::POST)
        .path("/mixed")
        .form(&[("x", "hello"), ("y", "world")])
        .build();

    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.get::<String>("x").unwrap(), "hello");
    assert_eq!(kwargs.get::<String>("y").unwrap(), "world");
    assert_eq!(conn.body_reads(), 1);
}

#[tokio::test]
async fn test_single_unembedded_body_binds_whole_document() {
    let sig = HandlerSignature::new("echo")
        .param(DeclaredParam::new("payload", json!({"type": "object"})).field(FieldSpec::body()));
    let model = build(sig, "/echo");
    let conn = HttpConnection::builder()
        .method(Method::POST)
        .path("/echo")
        .json(&json!({"a": 1}))
        .build();

    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.json("payload"), Some(&json!({"a": 1})));
}

#[tokio::test]
async fn test_repeated_query_collects_sequence() {
    let sig = HandlerSignature::new("tags").param(
        DeclaredParam::new("tag", string_list()).field(FieldSpec::query().default(json!([]))),
    );
    let model = build(sig, "/tags");

    let conn = HttpConnection::builder().path("/tags?tag=a&tag=b").build();
    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.get::<Vec<String>>("tag").unwrap(), vec!["a", "b"]);

    let conn = HttpConnection::builder().path("/tags").build();
    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.json("tag"), Some(&json!([])));
}

#[tokio::test]
async fn test_path_default_does_not_make_segment_optional() {
    let sig = HandlerSignature::new("get_item")
        .param(DeclaredParam::new("id", integer()).field(FieldSpec::path().default(json!(5))));
    let model = build(sig, "/items/{id}");

    let conn = HttpConnection::builder().path("/items/7").route(model.route()).build();
    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.get::<i64>("id").unwrap(), 7);

    // a dispatcher that failed to capture the segment must not get the default
    let conn = HttpConnection::builder().path("/items/").build();
    let issues = issues(model.resolve_dependencies(&conn).await.unwrap_err());
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::MissingRequiredValue);
    assert_eq!(issues[0].loc, loc("path", ["id"]));
}

#[tokio::test]
async fn test_literal_default_ignored_for_path_names() {
    let sig = HandlerSignature::new("get_item")
        .param(DeclaredParam::new("id", integer()).literal(json!(5)));
    let model = build(sig, "/items/{id}");
    let conn = HttpConnection::builder().path("/items/").build();
    let issues = issues(model.resolve_dependencies(&conn).await.unwrap_err());
    assert_eq!(issues[0].loc, loc("path", ["id"]));
}

#[tokio::test]
async fn test_identical_requests_resolve_identically() {
    let model = update_item_model();
    let request = || {
        HttpConnection::builder()
            .method(Method::PUT)
            .path("/items/42?q=hi")
            .route(model.route())
            .json(&json!({"name": "widget"}))
            .build()
    };
    let a = model.resolve_dependencies(&request()).await;
    let b = model.resolve_dependencies(&request()).await;
    assert_eq!(a, b);

    let bad = || HttpConnection::builder().path("/items/abc").route(model.route()).build();
    let a = model.resolve_dependencies(&bad()).await;
    let b = model.resolve_dependencies(&bad()).await;
    assert!(a.is_err());
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_update_item_scenario() {
    let model = update_item_model();
    let conn = HttpConnection::builder()
        .method(Method::PUT)
        .path("/items/42?q=hi")
        .route(model.route())
        .json(&json!({"name": "widget"}))
        .build();

    let kwargs = model.resolve_dependencies(&conn).await.unwrap();
    assert_eq!(kwargs.len(), 3);
    assert_eq!(kwargs.get::<i64>("id").unwrap(), 42);
    assert_eq!(kwargs.get::<String>("q").unwrap(), "hi");
    assert_eq!(kwargs.json("body"), Some(&json!({"name": "widget"})));
}

#[tokio::test]
async fn test_bad_path_and_missing_body_reported_together() {
    let model = update_item_model();
    let conn = HttpConnection::builder()
        .method(Method::PUT)
        .path("/items/abc")
        .route(model.route())
        .build();

    let err = model.resolve_dependencies(&conn).await.unwrap_err();
    assert_eq!(err.status_code(), 422);
    let issues = issues(err);
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].kind, IssueKind::MissingRequiredValue);
    assert_eq!(issues[0].loc, loc("body", Vec::<LocItem>::new()));
    assert_eq!(issues[1].kind, IssueKind::ValidationFailure);
    assert_eq!(issues[1].loc, loc("path", ["id"]));
    assert_eq!(issues[1].input, Some(json!("abc")));
}
