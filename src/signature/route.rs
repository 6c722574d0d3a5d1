use regex::Regex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/{id}/posts/{postId}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Names are `Arc<str>` because they come from the route template and are shared by
/// every request; values are per-request strings.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// A parsed route path such as `/items/{id}/tags/{tag}`.
///
/// Exposes the ordered `{name}` placeholders, which decide which handler parameters
/// are path parameters, and a matcher that captures them from a concrete path.
#[derive(Clone)]
pub struct RouteTemplate {
    path: String,
    /// `None` only if the pattern failed to compile, in which case nothing matches
    regex: Option<Regex>,
    names: Vec<Arc<str>>,
}

impl fmt::Debug for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTemplate")
            .field("path", &self.path)
            .field("names", &self.names)
            .finish()
    }
}

impl RouteTemplate {
    /// Parse a route path.
    ///
    /// Literal segments are regex-escaped, so `/v1.0/{id}` matches only a literal dot.
    ///
    /// ```rust
    /// use brrtrouter_args::signature::RouteTemplate;
    ///
    /// let t = RouteTemplate::parse("/users/{user_id}/posts/{post_id}");
    /// assert_eq!(t.param_names(), vec!["user_id", "post_id"]);
    /// assert!(t.contains("post_id"));
    /// ```
    pub fn parse(path: &str) -> Self {
        let mut pattern = String::with_capacity(path.len() + 5);
        pattern.push('^');
        let mut names: Vec<Arc<str>> = Vec::with_capacity(path.matches('{').count());

        for segment in path.split('/') {
            if segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2 {
                let name = segment.trim_start_matches('{').trim_end_matches('}');
                pattern.push_str("/([^/]+)");
                names.push(Arc::from(name));
            } else if !segment.is_empty() {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }
        if names.is_empty() && pattern == "^" {
            pattern.push('/');
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).ok();
        RouteTemplate {
            path: path.to_string(),
            regex,
            names,
        }
    }

    /// The original path pattern.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> Vec<&str> {
        self.names.iter().map(|n| n.as_ref()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.as_ref() == name)
    }

    /// Match a concrete path and return its percent-decoded parameters.
    ///
    /// ```rust
    /// use brrtrouter_args::signature::RouteTemplate;
    ///
    /// let t = RouteTemplate::parse("/files/{name}");
    /// let params = t.capture("/files/a%20b.txt").unwrap();
    /// assert_eq!(params[0].1, "a b.txt");
    /// assert!(t.capture("/other/x").is_none());
    /// ```
    pub fn capture(&self, path: &str) -> Option<ParamVec> {
        let path = path.split('?').next().unwrap_or(path);
        let caps = self.regex.as_ref()?.captures(path)?;
        let mut params = ParamVec::new();
        for (i, name) in self.names.iter().enumerate() {
            let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
            let value = urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            params.push((Arc::clone(name), value));
        }
        Some(params)
    }
}
