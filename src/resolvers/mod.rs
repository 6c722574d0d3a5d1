//! # Resolvers Module
//!
//! Per-source strategies that pull one field's value out of a [`RequestContext`] and
//! validate it against the field's model.
//!
//! ## Resolver Types
//!
//! | Resolver | Reads | Missing and required |
//! |---|---|---|
//! | [`HeaderParameterResolver`] | headers (first value, or all for sequences) | `("header", alias)` |
//! | [`QueryParameterResolver`] | query pairs (last value, or all for sequences) | `("query", alias)` |
//! | [`PathParameterResolver`] | matched path parameters | `("path", alias)` |
//! | [`CookieParameterResolver`] | cookies | `("cookie", alias)` |
//! | [`BodyParameterResolver`] | JSON body, whole or embedded under the alias | `("body",)` or `("body", alias)` |
//! | [`FormParameterResolver`] | decoded form | whole-form fallback, then `("body", alias)` |
//! | [`FileParameterResolver`] | uploaded files | `("body", alias)` |
//! | [`WsBodyParameterResolver`] | decoded WebSocket message | like Body |
//!
//! [`BulkParameterResolver`] runs the per-property resolvers of an expanded composite
//! parameter and re-validates the assembled object. [`BulkBodyResolver`] reads the
//! body once and feeds it to every body-like field of a handler.
//!
//! Resolvers are built once per route and hold no per-request state, so one instance
//! serves any number of concurrent requests.

mod body;
mod factory;
mod injected;
mod params;

pub use body::{
    load_json_body, BodyParameterResolver, BulkBodyResolver, FileParameterResolver,
    FormParameterResolver, PayloadKind, WsBodyParameterResolver,
};
pub use factory::ResolverFactory;
pub use injected::InjectedResolver;
pub use params::{
    BulkParameterResolver, CookieParameterResolver, HeaderParameterResolver,
    PathParameterResolver, QueryParameterResolver,
};

use crate::args::{ArgValue, ValueMap};
use crate::context::{FormData, RequestContext};
use crate::error::Issue;
use crate::model::ModelField;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Request-time strategy for one logical field.
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    /// The model this resolver validates against, read by the OpenAPI builder.
    fn model_field(&self) -> &ModelField;

    /// Wire-level models. A bulk resolver reports its children.
    fn models(&self) -> Vec<&ModelField> {
        vec![self.model_field()]
    }

    /// `{name: value}` on success, every issue found otherwise.
    async fn resolve(&self, ctx: &dyn RequestContext) -> Result<ValueMap, Vec<Issue>>;
}

/// An already decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPayload {
    /// Parsed JSON body; `None` when the request had no body
    Json(Option<Value>),
    Form(FormData),
    /// Decoded WebSocket message; `None` when there is none
    Message(Option<Value>),
}

/// A resolver for a body-like field, able to work from a payload decoded elsewhere.
#[async_trait]
pub trait BodyResolver: Resolver {
    async fn resolve_payload(&self, payload: &BodyPayload) -> Result<ValueMap, Vec<Issue>>;

    /// Which payload this resolver wants when it reads the body itself.
    fn payload_kind(&self) -> PayloadKind;

    fn as_resolver(self: Arc<Self>) -> Arc<dyn Resolver>;
}

/// `{field.name: value}`
pub(crate) fn single(field: &ModelField, value: ArgValue) -> ValueMap {
    let mut out = ValueMap::new();
    out.insert(field.name().to_string(), value);
    out
}
