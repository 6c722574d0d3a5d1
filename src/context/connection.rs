use super::form::FormData;
use super::multipart;
use super::services::ServiceProvider;
use super::{EndpointKind, RequestContext};
use crate::error::TransportError;
use crate::runtime_config::ArgsConfig;
use crate::signature::{ParamVec, RouteTemplate};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use http::{HeaderMap, Method};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// An HTTP request as seen by resolvers.
///
/// The body is a one-shot source: the first call to [`RequestContext::body`] takes it,
/// every later call gets the cached bytes. [`HttpConnection::body_reads`] counts how
/// often the underlying source was actually read.
pub struct HttpConnection {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    path_params: ParamVec,
    cookies: Vec<(String, String)>,
    raw_body: Mutex<Option<Bytes>>,
    body: OnceCell<Result<Bytes, TransportError>>,
    form: OnceCell<Result<FormData, TransportError>>,
    body_reads: AtomicUsize,
    config: ArgsConfig,
    services: Option<Arc<dyn ServiceProvider>>,
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("path_params", &self.path_params)
            .field("cookies", &self.cookies)
            .field("body_reads", &self.body_reads())
            .finish()
    }
}

impl HttpConnection {
    pub fn builder() -> HttpConnectionBuilder {
        HttpConnectionBuilder::default()
    }

    /// Build a connection from an `http::Request`, capturing path parameters with
    /// `template`. Returns `None` when the request path does not match the template.
    pub fn from_request(
        req: http::Request<Bytes>,
        template: &RouteTemplate,
        config: ArgsConfig,
    ) -> Option<Self> {
        let (parts, body) = req.into_parts();
        let path_params = template.capture(parts.uri.path())?;
        let mut builder = HttpConnection::builder()
            .method(parts.method)
            .path(parts.uri.path())
            .config(config)
            .body(body);
        if let Some(q) = parts.uri.query() {
            builder = builder.query_string(q);
        }
        builder.headers = parts.headers;
        builder.path_params = path_params;
        Some(builder.build())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of times the transport body was read. Never more than one.
    pub fn body_reads(&self) -> usize {
        self.body_reads.load(Ordering::SeqCst)
    }

    fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    fn take_body(&self) -> Result<Bytes, TransportError> {
        self.body_reads.fetch_add(1, Ordering::SeqCst);
        let body = self
            .raw_body
            .lock()
            .map_err(|_| TransportError::Read("body lock poisoned".to_string()))?
            .take()
            .unwrap_or_default();
        if body.len() > self.config.max_body_bytes {
            warn!(
                size = body.len(),
                max = self.config.max_body_bytes,
                "Request body exceeds limit"
            );
            return Err(TransportError::BodyTooLarge {
                size: body.len(),
                max: self.config.max_body_bytes,
            });
        }
        debug!(size = body.len(), path = %self.path, "Request body read");
        Ok(body)
    }

    async fn decode_form(&self) -> Result<FormData, TransportError> {
        let ct = self.content_type().unwrap_or_default().to_ascii_lowercase();
        if ct.starts_with("application/x-www-form-urlencoded") {
            let body = self.body().await?;
            Ok(FormData::from_urlencoded(&body))
        } else if ct.starts_with("multipart/form-data") {
            let boundary = multipart::boundary(self.content_type().unwrap_or_default())?;
            let body = self.body().await?;
            let parts = multipart::parse(&body, &boundary, &self.config.multipart_limits())?;
            Ok(FormData::from_parts(parts))
        } else {
            // Not a form submission; form fields see nothing
            Ok(FormData::new())
        }
    }
}

#[async_trait]
impl RequestContext for HttpConnection {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Http
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

    async fn body(&self) -> Result<Bytes, TransportError> {
        self.body
            .get_or_init(|| async { self.take_body() })
            .await
            .clone()
    }

    async fn form(&self) -> Result<FormData, TransportError> {
        self.form
            .get_or_init(|| self.decode_form())
            .await
            .clone()
    }

    fn services(&self) -> Option<&dyn ServiceProvider> {
        self.services.as_deref()
    }
}

/// Builder for [`HttpConnection`], mostly used by tests and simple dispatchers.
///
/// ```rust
/// use brrtrouter_args::context::{HttpConnection, RequestContext};
///
/// let conn = HttpConnection::builder()
///     .path("/items/42")
///     .query_string("q=hi&tag=a&tag=b")
///     .header("x-token", "secret")
///     .cookie("session", "abc")
///     .build();
/// assert_eq!(conn.query_params().len(), 3);
/// assert_eq!(conn.cookies()[0].1, "abc");
/// ```
#[derive(Default)]
pub struct HttpConnectionBuilder {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    path_params: ParamVec,
    cookies: Vec<(String, String)>,
    body: Option<Bytes>,
    config: Option<ArgsConfig>,
    services: Option<Arc<dyn ServiceProvider>>,
}

impl HttpConnectionBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Add a header. Invalid names or values are dropped with a warning.
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

    /// Append the pairs of a raw (still encoded) query string.
    pub fn query_string(mut self, query: &str) -> Self {
        self.query.extend(
            url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        self
    }

    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn path_param(mut self, name: &str, value: &str) -> Self {
        self.path_params.push((Arc::from(name), value.to_string()));
        self
    }

    /// Capture path parameters from the builder's path using `template`.
    pub fn route(mut self, template: &RouteTemplate) -> Self {
        if let Some(params) = template.capture(&self.path) {
            self.path_params = params;
        }
        self
    }

    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body with `Content-Type: application/json`.
    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header("content-type", "application/json")
            .body(value.to_string())
    }

    /// URL-encoded form body.
    pub fn form(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.header("content-type", "application/x-www-form-urlencoded")
            .body(encoded)
    }

    pub fn config(mut self, config: ArgsConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn services(mut self, services: Arc<dyn ServiceProvider>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn build(self) -> HttpConnection {
        let mut cookies = parse_cookies(&self.headers);
        cookies.extend(self.cookies);
        // a query string left on the path comes before pairs added explicitly
        let (path, mut query) = match self.path.split_once('?') {
            Some((p, q)) => (
                p.to_string(),
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
            ),
            None => (self.path, Vec::new()),
        };
        query.extend(self.query);
        HttpConnection {
            method: self.method,
            path,
            headers: self.headers,
            query,
            path_params: self.path_params,
            cookies,
            raw_body: Mutex::new(self.body),
            body: OnceCell::new(),
            form: OnceCell::new(),
            body_reads: AtomicUsize::new(0),
            config: self.config.unwrap_or_default(),
            services: self.services,
        }
    }
}

/// Parse every `Cookie` header into percent-decoded `(name, value)` pairs.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|c| c.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_body_read_once() {
        let conn = HttpConnection::builder().body("hello").build();
        assert_eq!(&conn.body().await.unwrap()[..], b"hello");
        assert_eq!(&conn.body().await.unwrap()[..], b"hello");
        assert_eq!(conn.body_reads(), 1);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let config = ArgsConfig {
            max_body_bytes: 4,
            ..ArgsConfig::default()
        };
        let conn = HttpConnection::builder()
            .body("too long")
            .config(config)
            .build();
        assert!(matches!(
            conn.body().await,
            Err(TransportError::BodyTooLarge { size: 8, max: 4 })
        ));
    }

    #[tokio::test]
    async fn test_form_only_for_form_content_types() {
        let conn = HttpConnection::builder()
            .json(&serde_json::json!({"a": 1}))
            .build();
        assert!(conn.form().await.unwrap().is_empty());

        let conn = HttpConnection::builder().form(&[("a", "1 2")]).build();
        let form = conn.form().await.unwrap();
        assert_eq!(form.get("a").and_then(|v| v.as_text()), Some("1 2"));
        assert_eq!(conn.body_reads(), 1);
    }

    #[test]
    fn test_parse_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; b=hello%20world; =x; c"));
        let cookies = parse_cookies(&headers);
        assert_eq!(
            cookies,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "hello world".to_string())
            ]
        );
    }

    #[test]
    fn test_from_request() {
        let req = http::Request::builder()
            .method(Method::PUT)
            .uri("/items/42?q=hi")
            .header("cookie", "s=1")
            .body(Bytes::new())
            .unwrap();
        let conn = HttpConnection::from_request(
            req,
            &RouteTemplate::parse("/items/{id}"),
            ArgsConfig::default(),
        )
        .unwrap();
        assert_eq!(conn.path_params()[0].1, "42");
        assert_eq!(conn.query_params()[0], ("q".to_string(), "hi".to_string()));
        assert_eq!(conn.cookies().len(), 1);
        assert_eq!(*conn.method(), Method::PUT);
    }
}
