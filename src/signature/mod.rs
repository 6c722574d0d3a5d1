//! # Signature Module
//!
//! Registration-time classification of handler parameters.
//!
//! A handler is described by an explicit [`HandlerSignature`]: its parameters in
//! declaration order, each with a declared type ([`TypeRef`]) and a default
//! ([`ParamDefault`]) that is either nothing, a literal, a source marker
//! ([`FieldSpec`](crate::params::FieldSpec)) or an injected service. [`inspect`] turns
//! that into [`ParamDescriptor`]s using the route's [`RouteTemplate`] to decide which
//! names are path parameters.
//!
//! ## Classification Rules
//!
//! | Declared | Result |
//! |---|---|
//! | `request` / `websocket` / `context`, no default | connection object |
//! | injected default | service from the provider |
//! | name is a `{placeholder}` in the route | required path parameter |
//! | `FieldSpec` default | that source |
//! | literal default | optional query parameter |
//! | no default | required query parameter |
//!
//! Object-typed query, header and cookie parameters are expanded into one field per
//! property.

mod inspect;
mod route;

pub use crate::model::SchemaNamespace;
pub use inspect::{
    inspect, DeclaredParam, HandlerSignature, ParamDefault, ParamDescriptor, ParamKind, TypeRef,
};
pub use route::{ParamVec, RouteTemplate, MAX_INLINE_PARAMS};
