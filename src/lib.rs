//! # brrtrouter-args
//!
//! **brrtrouter-args** turns a handler's declared parameters into validated keyword
//! arguments, or into the complete list of what was wrong with the request.
//!
//! ## Overview
//!
//! A handler declares its parameters once: a name, a JSON Schema type, and optionally
//! a [`FieldSpec`](params::FieldSpec) saying where the value comes from (path, query,
//! header, cookie, body, form, file) and which constraints it must meet. At route
//! registration an [`EndpointArgsModel`](args::EndpointArgsModel) classifies those
//! parameters, compiles their schemas and builds one resolver per parameter. Per
//! request it runs the resolvers against a [`RequestContext`](context::RequestContext)
//! and returns either [`Kwargs`](args::Kwargs) or a
//! [`ResolveError`](error::ResolveError) carrying every issue found.
//!
//! ## Architecture
//!
//! - **[`params`]** - Field specifications: source, alias, default, constraints
//! - **[`model`]** - Compiled model fields, schema walking and string decoding
//! - **[`signature`]** - Handler signatures, route templates and parameter classification
//! - **[`resolvers`]** - Per-source request-time resolvers and the resolver factory
//! - **[`args`]** - The per-endpoint orchestrator, body composition and resolved values
//! - **[`context`]** - Request contexts (HTTP, WebSocket), form and multipart decoding,
//!   dependency injection
//! - **[`error`]** - Located issues, aggregation and the registration-time error taxonomy
//! - **[`validator_cache`]** - Compiled JSON Schema validators shared across models
//! - **[`runtime_config`]** / **[`logging`]** - `BRRTR_*` environment configuration and
//!   `tracing` setup
//!
//! ### Registration
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App
//!     participant Model as EndpointArgsModel
//!     participant Inspect as signature::inspect
//!     participant Field as ModelField
//!     participant Factory as ResolverFactory
//!     participant Compose as compose_body
//!
//!     App->>Model: build(signature, "/items/{id}", options)
//!     Model->>Inspect: inspect(signature, template)
//!     Inspect-->>Model: Vec<ParamDescriptor>
//!     loop each descriptor
//!         Model->>Field: compile(name, spec, schema, cache)
//!         Model->>Factory: create(field, options)
//!     end
//!     Model->>Compose: compose_body(handler, body_fields)
//!     Compose-->>Model: one body resolver (or none)
//! ```
//!
//! ### Resolution
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Dispatcher
//!     participant Model as EndpointArgsModel
//!     participant Body as body resolver
//!     participant Others as header/path/query/cookie
//!
//!     Dispatcher->>Model: resolve_dependencies(&conn)
//!     Model->>Body: resolve (reads the body once)
//!     alt body cannot be decoded
//!         Model-->>Dispatcher: Err(400, [body issue])
//!     else
//!         Model->>Others: join_all(resolve)
//!         Model-->>Dispatcher: Ok(Kwargs) or Err(422, all issues)
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtrouter_args::args::{BuildOptions, EndpointArgsModel};
//! use brrtrouter_args::context::HttpConnection;
//! use brrtrouter_args::params::FieldSpec;
//! use brrtrouter_args::signature::{DeclaredParam, HandlerSignature, SchemaNamespace};
//! use http::Method;
//! use serde_json::json;
//!
//! let ns = SchemaNamespace::new().with(
//!     "Item",
//!     json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
//! );
//! let sig = HandlerSignature::new("update_item")
//!     .namespace(ns)
//!     .param(DeclaredParam::new("id", json!({"type": "integer"})).field(FieldSpec::path()))
//!     .param(DeclaredParam::new("q", json!({"type": "string"})).literal(json!("x")))
//!     .param(DeclaredParam::named("body", "Item").field(FieldSpec::body()));
//!
//! let model = EndpointArgsModel::build(sig, "/items/{id}", BuildOptions::default())?;
//!
//! let conn = HttpConnection::builder()
//!     .method(Method::PUT)
//!     .path("/items/42?q=hi")
//!     .route(model.route())
//!     .json(&json!({"name": "widget"}))
//!     .build();
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build()?;
//! let kwargs = rt.block_on(model.resolve_dependencies(&conn))?;
//! assert_eq!(kwargs.get::<i64>("id")?, 42);
//! assert_eq!(kwargs.json("body"), Some(&json!({"name": "widget"})));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `BRRTR_MAX_BODY_BYTES` | 2 MiB | largest body buffered |
//! | `BRRTR_MULTIPART_MAX_FIELDS` | 1000 | parts per multipart body |
//! | `BRRTR_MULTIPART_MAX_FILE_BYTES` | 1 MiB | size of one uploaded file |
//! | `BRRTR_SCHEMA_CACHE` | on | share compiled validators |
//! | `BRRTR_WS_EXTRA_HANDLERS` | off | allow body fields on WebSocket handlers |
//! | `BRRTR_LOG_LEVEL`, `BRRTR_LOG_FORMAT` | info, json | see [`logging`] |

pub mod args;
pub mod context;
pub mod error;
pub mod logging;
pub mod model;
pub mod params;
pub mod resolvers;
pub mod runtime_config;
pub mod signature;
pub mod validator_cache;

pub use args::{ArgValue, BuildOptions, EndpointArgsModel, Kwargs};
pub use context::{HttpConnection, RequestContext, WebSocketConnection};
pub use error::{ConfigError, Issue, IssueKind, LocItem, ResolveError, ValidationErrors};
pub use params::{FieldSpec, ParamSource};
pub use signature::{DeclaredParam, HandlerSignature};
