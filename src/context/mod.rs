//! # Request Context Module
//!
//! What resolvers read from. A [`RequestContext`] exposes the transport data of one
//! request (headers, query pairs, matched path parameters, cookies, body, decoded
//! form, WebSocket message) and the dependency-injection [`ServiceProvider`].
//!
//! Two implementations ship with the crate:
//!
//! - [`HttpConnection`] wraps an HTTP request. Its body is read from the transport at
//!   most once and cached for the lifetime of the request.
//! - [`WebSocketConnection`] wraps a WebSocket upgrade plus the decoded message being
//!   dispatched.
//!
//! Dispatchers with their own request types implement the trait directly.

mod connection;
mod form;
pub mod multipart;
mod services;
mod websocket;

pub use connection::{parse_cookies, HttpConnection, HttpConnectionBuilder};
pub use form::{FormData, FormValue, UploadFile};
pub use services::{ServiceKey, ServiceProvider, ServiceRef, ServiceRegistry};
pub use websocket::WebSocketConnection;

use crate::error::TransportError;
use crate::signature::ParamVec;
use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

/// Kind of endpoint a handler is registered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    #[default]
    Http,
    WebSocket,
}

/// Well-known objects a handler can receive by parameter name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// `request`: the HTTP connection
    Request,
    /// `websocket`: the WebSocket connection
    WebSocket,
    /// `context`: the execution context
    Context,
}

impl ContextKind {
    /// The reserved parameter name bound to this kind, if `name` is one.
    pub fn from_param_name(name: &str) -> Option<Self> {
        match name {
            "request" => Some(ContextKind::Request),
            "websocket" => Some(ContextKind::WebSocket),
            "context" => Some(ContextKind::Context),
            _ => None,
        }
    }
}

/// Transport view of one request, shared by every resolver of an endpoint.
///
/// Implementations must be safe to read from concurrently: non-body resolvers run
/// side by side against the same context.
#[async_trait]
pub trait RequestContext: Send + Sync {
    fn kind(&self) -> EndpointKind;

    fn headers(&self) -> &HeaderMap;

    /// Decoded query pairs in request order; keys may repeat.
    fn query_params(&self) -> &[(String, String)];

    /// Path parameters captured by the route matcher, percent-decoded.
    fn path_params(&self) -> &ParamVec;

    /// Cookies in header order, percent-decoded.
    fn cookies(&self) -> &[(String, String)];

    /// Raw request body. Reads the transport on first call only.
    async fn body(&self) -> Result<Bytes, TransportError>;

    /// Decoded form (urlencoded or multipart). Empty for non-form content types.
    async fn form(&self) -> Result<FormData, TransportError>;

    /// Pre-decoded WebSocket message, if this is a WebSocket dispatch.
    fn message(&self) -> Option<&Value> {
        None
    }

    fn services(&self) -> Option<&dyn ServiceProvider> {
        None
    }

    fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers()
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    fn query_values(&self, name: &str) -> Vec<&str> {
        self.query_params()
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params()
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}
