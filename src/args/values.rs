use crate::context::{ContextKind, ServiceRef, UploadFile};
use bytes::Bytes;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One resolved handler argument.
#[derive(Clone)]
pub enum ArgValue {
    /// Validated JSON value
    Json(Value),
    Upload(UploadFile),
    Uploads(Vec<UploadFile>),
    /// Contents of a byte-typed file field
    Bytes(Bytes),
    BytesList(Vec<Bytes>),
    /// Injected service
    Service(ServiceRef),
    /// Marker for the connection or execution context, supplied by the dispatcher
    Context(ContextKind),
}

impl ArgValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ArgValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgValue::Json(a), ArgValue::Json(b)) => a == b,
            (ArgValue::Upload(a), ArgValue::Upload(b)) => a == b,
            (ArgValue::Uploads(a), ArgValue::Uploads(b)) => a == b,
            (ArgValue::Bytes(a), ArgValue::Bytes(b)) => a == b,
            (ArgValue::BytesList(a), ArgValue::BytesList(b)) => a == b,
            // same instance, not structural equality
            (ArgValue::Service(a), ArgValue::Service(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (ArgValue::Context(a), ArgValue::Context(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Json(v) => write!(f, "Json({})", v),
            ArgValue::Upload(u) => f.debug_tuple("Upload").field(u).finish(),
            ArgValue::Uploads(u) => f.debug_tuple("Uploads").field(u).finish(),
            ArgValue::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            ArgValue::BytesList(b) => write!(f, "BytesList({} files)", b.len()),
            ArgValue::Service(_) => f.write_str("Service(..)"),
            ArgValue::Context(k) => f.debug_tuple("Context").field(k).finish(),
        }
    }
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        ArgValue::Json(v)
    }
}

/// Resolved values keyed by handler parameter name.
pub type ValueMap = BTreeMap<String, ArgValue>;

/// The keyword arguments a handler is invoked with.
///
/// ```rust
/// use brrtrouter_args::args::{ArgValue, Kwargs};
/// use serde_json::json;
///
/// let mut kwargs = Kwargs::new();
/// kwargs.insert("id", ArgValue::Json(json!(42)));
/// let id: i64 = kwargs.get("id").unwrap();
/// assert_eq!(id, 42);
///
/// // absent optional parameters deserialize as `None`
/// let q: Option<String> = kwargs.get("q").unwrap();
/// assert!(q.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs {
    values: ValueMap,
}

impl Kwargs {
    pub fn new() -> Self {
        Kwargs::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn extend(&mut self, values: ValueMap) {
        self.values.extend(values);
    }

    /// Deserialize a JSON argument into `T`.
    ///
    /// A name with no value deserializes from `null`, so `Option<T>` yields `None`.
    ///
    /// # Errors
    ///
    /// The deserializer's error when the value does not fit `T`, or when the argument is
    /// not a JSON value (an upload or a service).
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, serde_json::Error> {
        match self.values.get(name) {
            None => serde_json::from_value(Value::Null),
            Some(ArgValue::Json(v)) => serde_json::from_value(v.clone()),
            Some(other) => Err(serde_json::Error::custom(format!(
                "argument '{}' is not a JSON value: {:?}",
                name, other
            ))),
        }
    }

    pub fn json(&self, name: &str) -> Option<&Value> {
        self.values.get(name).and_then(ArgValue::as_json)
    }

    /// Injected service downcast to its concrete type.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name) {
            Some(ArgValue::Service(s)) => Arc::clone(s).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn upload(&self, name: &str) -> Option<&UploadFile> {
        match self.values.get(name) {
            Some(ArgValue::Upload(u)) => Some(u),
            _ => None,
        }
    }

    pub fn uploads(&self, name: &str) -> Option<&[UploadFile]> {
        match self.values.get(name) {
            Some(ArgValue::Uploads(u)) => Some(u),
            _ => None,
        }
    }

    pub fn bytes(&self, name: &str) -> Option<&Bytes> {
        match self.values.get(name) {
            Some(ArgValue::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    pub fn bytes_list(&self, name: &str) -> Option<&[Bytes]> {
        match self.values.get(name) {
            Some(ArgValue::BytesList(b)) => Some(b),
            _ => None,
        }
    }

    pub fn context(&self, name: &str) -> Option<ContextKind> {
        match self.values.get(name) {
            Some(ArgValue::Context(k)) => Some(*k),
            _ => None,
        }
    }

    pub fn raw(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> ValueMap {
        self.values
    }

    /// JSON arguments only, as one object. Handy for logging and echo handlers.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .filter_map(|(k, v)| v.as_json().map(|j| (k.clone(), j.clone())))
                .collect(),
        )
    }
}

impl IntoIterator for Kwargs {
    type Item = (String, ArgValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ArgValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
