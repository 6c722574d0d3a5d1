use super::form::FormData;
use super::services::ServiceProvider;
use super::{EndpointKind, RequestContext};
use crate::error::TransportError;
use crate::signature::{ParamVec, RouteTemplate};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// A WebSocket connection plus the message currently being dispatched.
///
/// Message framing and decoding happen upstream; resolvers only see the decoded
/// payload through [`RequestContext::message`]. The upgrade request's headers, query,
/// path parameters and cookies stay available for the non-body fields.
#[derive(Default, Clone)]
pub struct WebSocketConnection {
    headers: HeaderMap,
    query: Vec<(String, String)>,
    path_params: ParamVec,
    cookies: Vec<(String, String)>,
    message: Option<Value>,
    services: Option<Arc<dyn ServiceProvider>>,
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("path_params", &self.path_params)
            .field("message", &self.message)
            .finish()
    }
}

impl WebSocketConnection {
    pub fn new() -> Self {
        WebSocketConnection::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.append(n, v);
            }
            _ => warn!(header = name, "Dropping invalid header"),
        }
        self
    }

    pub fn query_string(mut self, query: &str) -> Self {
        self.query.extend(
            url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        self
    }

    pub fn path_param(mut self, name: &str, value: &str) -> Self {
        self.path_params.push((Arc::from(name), value.to_string()));
        self
    }

    /// Capture path parameters from the upgrade path.
    pub fn route(mut self, template: &RouteTemplate, path: &str) -> Self {
        if let Some(params) = template.capture(path) {
            self.path_params = params;
        }
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    pub fn services(mut self, services: Arc<dyn ServiceProvider>) -> Self {
        self.services = Some(services);
        self
    }

    /// Same connection, next message. Connection-level data is shared.
    pub fn with_message(&self, message: Value) -> Self {
        let mut next = self.clone();
        next.message = Some(message);
        next
    }
}

#[async_trait]
impl RequestContext for WebSocketConnection {
    fn kind(&self) -> EndpointKind {
        EndpointKind::WebSocket
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    fn path_params(&self) -> &ParamVec {
        &self.path_params
    }

    fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// A WebSocket has no request body.
    async fn body(&self) -> Result<Bytes, TransportError> {
        Ok(Bytes::new())
    }

    async fn form(&self) -> Result<FormData, TransportError> {
        Ok(FormData::new())
    }

    fn message(&self) -> Option<&Value> {
        self.message.as_ref()
    }

    fn services(&self) -> Option<&dyn ServiceProvider> {
        self.services.as_deref()
    }
}
