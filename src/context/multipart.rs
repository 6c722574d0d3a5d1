//! `multipart/form-data` decoding.
//!
//! The whole body is already buffered by the connection, so this is a single pass over
//! a `Bytes` buffer: find each `--boundary` delimiter, read the part headers, and slice
//! the part content without copying.

use bytes::Bytes;
use std::fmt;

/// Limits applied while decoding, taken from `ArgsConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartLimits {
    pub max_fields: usize,
    pub max_file_bytes: usize,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        MultipartLimits {
            max_fields: 1000,
            max_file_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// `Content-Type` has no usable `boundary=` parameter
    MissingBoundary,
    /// The body ended before the closing delimiter
    UnexpectedEof,
    /// A part had no `Content-Disposition: form-data; name=...`
    MissingName,
    /// Structurally broken part headers
    InvalidHeaders(String),
    TooManyFields { max: usize },
    FileTooLarge { name: String, size: usize, max: usize },
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::MissingBoundary => write!(f, "multipart boundary not found in Content-Type"),
            MultipartError::UnexpectedEof => write!(f, "multipart body ended before the closing boundary"),
            MultipartError::MissingName => write!(f, "multipart part without a form-data name"),
            MultipartError::InvalidHeaders(detail) => {
                write!(f, "invalid multipart part headers: {}", detail)
            }
            MultipartError::TooManyFields { max } => {
                write!(f, "multipart form has more than {} parts", max)
            }
            MultipartError::FileTooLarge { name, size, max } => write!(
                f,
                "file '{}' is {} bytes, limit is {}",
                name, size, max
            ),
        }
    }
}

impl std::error::Error for MultipartError {}

/// One decoded part.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Part {
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }
}

/// Extract the boundary from a `multipart/form-data; boundary=...` header value.
pub fn boundary(content_type: &str) -> Result<String, MultipartError> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// Decode every part of `body`.
///
/// ```rust
/// use brrtrouter_args::context::multipart::{parse, MultipartLimits};
/// use bytes::Bytes;
///
/// let body = Bytes::from_static(
///     b"--XX\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--XX--\r\n",
/// );
/// let parts = parse(&body, "XX", &MultipartLimits::default()).unwrap();
/// assert_eq!(parts[0].name, "a");
/// assert_eq!(&parts[0].data[..], b"1");
/// ```
pub fn parse(body: &Bytes, boundary: &str, limits: &MultipartLimits) -> Result<Vec<Part>, MultipartError> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let line_delimiter = format!("\r\n--{}", boundary).into_bytes();
    let mut parts = Vec::new();
    let mut pos = find(body, &delimiter, 0).ok_or(MultipartError::UnexpectedEof)?;

    loop {
        pos += delimiter.len();
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(MultipartError::InvalidHeaders(
                "expected CRLF after boundary".to_string(),
            ));
        }
        pos += 2;

        let header_end = find(body, b"\r\n\r\n", pos).ok_or(MultipartError::UnexpectedEof)?;
        let headers = std::str::from_utf8(&body[pos..header_end])
            .map_err(|_| MultipartError::InvalidHeaders("non UTF-8 header".to_string()))?;
        let (name, filename, content_type) = part_headers(headers)?;
        let data_start = header_end + 4;

        // a delimiter only counts at the start of a line
        let data_end = find(body, &line_delimiter, data_start).ok_or(MultipartError::UnexpectedEof)?;
        let next = data_end + 2;

        if parts.len() >= limits.max_fields {
            return Err(MultipartError::TooManyFields {
                max: limits.max_fields,
            });
        }
        let size = data_end - data_start;
        if filename.is_some() && size > limits.max_file_bytes {
            return Err(MultipartError::FileTooLarge {
                name,
                size,
                max: limits.max_file_bytes,
            });
        }

        parts.push(Part {
            name,
            filename,
            content_type,
            data: body.slice(data_start..data_end),
        });
        pos = next;
    }
}

type PartHeaders = (String, Option<String>, Option<String>);

fn part_headers(block: &str) -> Result<PartHeaders, MultipartError> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in block.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            return Err(MultipartError::InvalidHeaders(line.to_string()));
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }
    let name = name.ok_or(MultipartError::MissingName)?;
    Ok((name, filename, content_type))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
