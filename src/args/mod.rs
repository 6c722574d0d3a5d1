//! # Endpoint Arguments Module
//!
//! The per-handler orchestrator. An [`EndpointArgsModel`] is built once when a route
//! is registered and then resolves the arguments of every request to that route.
//!
//! ## Build
//!
//! 1. The handler signature is classified against the route template
//!    ([`crate::signature::inspect`])
//! 2. Each parameter is compiled into a [`ModelField`](crate::model::ModelField) and
//!    handed to the [`ResolverFactory`](crate::resolvers::ResolverFactory)
//! 3. Body-like fields are folded by [`compose_body`] into the single resolver that
//!    reads the request body
//!
//! ## Resolve
//!
//! The body resolver runs first. A body that cannot be decoded ends resolution with
//! that one issue. Otherwise all other resolvers run concurrently and every issue is
//! collected, so a client learns about all bad inputs from one response.
//!
//! ```text
//! body ──► parse failure? ──yes──► Err([body issue])
//!               │ no
//!               ▼
//! header, path, query, cookie (join_all) ──► injected services ──► Kwargs | Err(issues)
//! ```

mod compose;
mod model;
mod options;
mod values;

pub use crate::context::EndpointKind;
pub use compose::compose_body;
pub use model::EndpointArgsModel;
pub use options::BuildOptions;
pub use values::{ArgValue, Kwargs, ValueMap};
