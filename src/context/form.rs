use super::multipart::Part;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::fmt;

/// An uploaded file from a multipart form.
///
/// Contents are held in memory as a `Bytes` slice of the request body, so cloning an
/// upload never copies file data.
#[derive(Clone, PartialEq)]
pub struct UploadFile {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        UploadFile {
            filename: filename.into(),
            content_type,
            data,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Read the file contents.
    pub async fn read(&self) -> Bytes {
        // Yield so reads of several files interleave like real I/O would
        tokio::task::yield_now().await;
        self.data.clone()
    }

    /// Metadata view used when a whole form is validated as one object.
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "filename": self.filename,
            "content_type": self.content_type,
            "size": self.data.len(),
        })
    }
}

/// One value of a form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(UploadFile),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadFile> {
        match self {
            FormValue::File(f) => Some(f),
            FormValue::Text(_) => None,
        }
    }

    /// An empty text value counts as absent, the way browsers submit blank inputs.
    pub fn is_blank(&self) -> bool {
        matches!(self, FormValue::Text(s) if s.is_empty())
    }
}

/// Decoded form payload with repeated keys preserved in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        FormData::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: FormValue) {
        self.entries.push((name.into(), value));
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &[u8]) -> Self {
        FormData {
            entries: url::form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), FormValue::Text(v.into_owned())))
                .collect(),
        }
    }

    /// Build from decoded multipart parts. Parts without a filename are text fields.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        let entries = parts
            .into_iter()
            .map(|p| {
                let value = match p.filename {
                    Some(filename) => {
                        FormValue::File(UploadFile::new(filename, p.content_type, p.data))
                    }
                    None => FormValue::Text(String::from_utf8_lossy(&p.data).into_owned()),
                };
                (p.name, value)
            })
            .collect();
        FormData { entries }
    }

    /// Last value submitted under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Every value submitted under `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.entries
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The whole form as a JSON object; repeated keys become arrays.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (name, value) in &self.entries {
            let v = match value {
                FormValue::Text(s) => Value::String(s.clone()),
                FormValue::File(f) => f.describe(),
            };
            match out.get_mut(name) {
                Some(Value::Array(items)) => items.push(v),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, v]);
                }
                None => {
                    out.insert(name.clone(), v);
                }
            }
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_urlencoded() {
        let form = FormData::from_urlencoded(b"name=widget+one&tag=a&tag=b&empty=");
        assert_eq!(form.get("name").and_then(|v| v.as_text()), Some("widget one"));
        assert_eq!(form.get_all("tag").len(), 2);
        assert_eq!(form.get("tag").and_then(|v| v.as_text()), Some("b"));
        assert!(form.get("empty").map(|v| v.is_blank()).unwrap_or(false));
    }

    #[test]
    fn test_to_json_groups_repeated_keys() {
        let form = FormData::from_urlencoded(b"a=1&t=x&t=y&t=z");
        assert_eq!(form.to_json(), json!({"a": "1", "t": ["x", "y", "z"]}));
    }

    #[tokio::test]
    async fn test_upload_read() {
        let f = UploadFile::new("a.txt", None, Bytes::from_static(b"abc"));
        assert_eq!(f.size(), 3);
        assert_eq!(&f.read().await[..], b"abc");
    }
}
