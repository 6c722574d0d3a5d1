use brrtrouter_args::args::{BuildOptions, EndpointArgsModel};
use brrtrouter_args::context::HttpConnection;
use brrtrouter_args::params::FieldSpec;
use brrtrouter_args::signature::{DeclaredParam, HandlerSignature, SchemaNamespace};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use serde_json::json;
use tokio::runtime::Runtime;

fn item_namespace() -> SchemaNamespace {
    SchemaNamespace::new().with(
        "Item",
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "price": {"type": "number", "minimum": 0},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name"]
        }),
    )
}

/// `update_item(id: Path, q: Query = "x", x_token: Header, body: Item)`
fn update_item_model() -> EndpointArgsModel {
    let sig = HandlerSignature::new("update_item")
        .namespace(item_namespace())
        .param(DeclaredParam::new("id", json!({"type": "integer"})).field(FieldSpec::path()))
        .param(DeclaredParam::new("q", json!({"type": "string"})).literal(json!("x")))
        .param(DeclaredParam::new("x_token", json!({"type": "string"})).field(FieldSpec::header()))
        .param(DeclaredParam::named("body", "Item").field(FieldSpec::body()));
    EndpointArgsModel::build(sig, "/items/{id}", BuildOptions::default()).unwrap()
}

fn request(model: &EndpointArgsModel, body: &serde_json::Value) -> HttpConnection {
    HttpConnection::builder()
        .method(Method::PUT)
        .path("/items/42?q=hi")
        .route(model.route())
        .header("x-token", "secret")
        .json(body)
        .build()
}

/// Build cost per route registration
fn bench_build(c: &mut Criterion) {
    c.bench_function("args_model_build", |b| {
        b.iter(|| black_box(update_item_model()))
    });
}

/// Full resolution of a valid request
fn bench_resolve_valid(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let model = update_item_model();
    let body = json!({"name": "widget", "price": 9.5, "tags": ["a", "b"]});

    c.bench_function("resolve_valid_request", |b| {
        b.to_async(&rt).iter(|| async {
            let conn = request(&model, &body);
            black_box(model.resolve_dependencies(&conn).await)
        })
    });
}

/// Resolution that fails in several places and aggregates every issue
fn bench_resolve_invalid(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let model = update_item_model();
    let body = json!({"price": -1, "tags": [1, 2]});

    c.bench_function("resolve_invalid_request", |b| {
        b.to_async(&rt).iter(|| async {
            let conn = HttpConnection::builder()
                .method(Method::PUT)
                .path("/items/abc")
                .route(model.route())
                .json(&body)
                .build();
            black_box(model.resolve_dependencies(&conn).await)
        })
    });
}

/// Query-heavy handlers: cost grows with the number of declared parameters
fn bench_query_params(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolve_query_params");
    for count in [1usize, 4, 16].iter() {
        let mut sig = HandlerSignature::new("search");
        let mut query = String::new();
        for i in 0..*count {
            sig = sig.param(DeclaredParam::new(format!("p{}", i), json!({"type": "integer"})));
            if i > 0 {
                query.push('&');
            }
            query.push_str(&format!("p{}={}", i, i));
        }
        let model = EndpointArgsModel::build(sig, "/search", BuildOptions::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &query, |b, query| {
            b.to_async(&rt).iter(|| async {
                let conn = HttpConnection::builder().path("/search").query_string(query).build();
                black_box(model.resolve_dependencies(&conn).await)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_resolve_valid,
    bench_resolve_invalid,
    bench_query_params
);
criterion_main!(benches);
