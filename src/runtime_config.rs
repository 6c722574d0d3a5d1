//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for parameter resolution.
//!
//! ## Overview
//!
//! This module loads the limits and switches that affect how request inputs are read
//! and how argument models are built:
//! - Request body and multipart limits
//! - Validator caching
//! - WebSocket body fields
//!
//! ## Environment Variables
//!
//! ### `BRRTR_MAX_BODY_BYTES`
//!
//! Largest request body a connection will buffer. Accepts values in:
//! - Decimal: `2097152` (2 MiB)
//! - Hexadecimal: `0x200000` (2 MiB)
//!
//! Default: `0x200000` (2 MiB)
//!
//! ### `BRRTR_MULTIPART_MAX_FIELDS`
//!
//! Maximum number of parts in one `multipart/form-data` body. Default: `1000`
//!
//! ### `BRRTR_MULTIPART_MAX_FILE_BYTES`
//!
//! Maximum size of a single uploaded file, decimal or hex. Default: `0x100000` (1 MiB)
//!
//! ### `BRRTR_SCHEMA_CACHE`
//!
//! `on` (default) shares compiled validators between identical schemas; `off`
//! compiles one per field.
//!
//! ### `BRRTR_WS_EXTRA_HANDLERS`
//!
//! `true`/`1`/`on` enables body fields on WebSocket handlers. Off by default: a
//! WebSocket handler declaring a body field fails to register.
//!
//! ## Usage
//!
//! ```rust
//! use brrtrouter_args::runtime_config::ArgsConfig;
//!
//! let config = ArgsConfig::from_env();
//! println!("Body limit: {} bytes", config.max_body_bytes);
//! ```
//!
//! ## Example Configuration
//!
//! ```bash
//! # Accept bodies up to 8 MiB
//! export BRRTR_MAX_BODY_BYTES=0x800000
//!
//! # Allow WebSocket message bodies as handler arguments
//! export BRRTR_WS_EXTRA_HANDLERS=true
//! ```
//!
//! Unparseable values fall back to the default silently.

use crate::context::multipart::MultipartLimits;
use std::env;

const DEFAULT_MAX_BODY_BYTES: usize = 0x20_0000;
const DEFAULT_MULTIPART_MAX_FIELDS: usize = 1000;
const DEFAULT_MULTIPART_MAX_FILE_BYTES: usize = 0x10_0000;

/// Resolution configuration loaded from environment variables.
///
/// Load this at startup using [`ArgsConfig::from_env()`] and pass it to
/// `BuildOptions::from_config` and the connection builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgsConfig {
    /// Largest request body buffered, in bytes (default: 2 MiB)
    pub max_body_bytes: usize,
    /// Maximum parts in a multipart body (default: 1000)
    pub multipart_max_fields: usize,
    /// Maximum size of one uploaded file (default: 1 MiB)
    pub multipart_max_file_bytes: usize,
    /// Share compiled validators between identical schemas (default: on)
    pub schema_cache: bool,
    /// Allow body fields on WebSocket handlers (default: off)
    pub ws_extra_handlers: bool,
}

impl Default for ArgsConfig {
    fn default() -> Self {
        ArgsConfig {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            multipart_max_fields: DEFAULT_MULTIPART_MAX_FIELDS,
            multipart_max_file_bytes: DEFAULT_MULTIPART_MAX_FILE_BYTES,
            schema_cache: true,
            ws_extra_handlers: false,
        }
    }
}

impl ArgsConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, config map, test fixture).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let size = |key: &str, default: usize| {
            lookup(key)
                .and_then(|v| parse_size(&v))
                .unwrap_or(default)
        };
        let flag = |key: &str, default: bool| {
            lookup(key).and_then(|v| parse_flag(&v)).unwrap_or(default)
        };
        ArgsConfig {
            max_body_bytes: size("BRRTR_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            multipart_max_fields: size("BRRTR_MULTIPART_MAX_FIELDS", DEFAULT_MULTIPART_MAX_FIELDS),
            multipart_max_file_bytes: size(
                "BRRTR_MULTIPART_MAX_FILE_BYTES",
                DEFAULT_MULTIPART_MAX_FILE_BYTES,
            ),
            schema_cache: flag("BRRTR_SCHEMA_CACHE", true),
            ws_extra_handlers: flag("BRRTR_WS_EXTRA_HANDLERS", false),
        }
    }

    pub fn multipart_limits(&self) -> MultipartLimits {
        MultipartLimits {
            max_fields: self.multipart_max_fields,
            max_file_bytes: self.multipart_max_file_bytes,
        }
    }
}

/// Decimal or `0x`-prefixed hexadecimal.
fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ArgsConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ArgsConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), ArgsConfig::default());
        assert_eq!(ArgsConfig::default().max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_hex_and_decimal_sizes() {
        let c = config(&[
            ("BRRTR_MAX_BODY_BYTES", "0x400"),
            ("BRRTR_MULTIPART_MAX_FILE_BYTES", "2048"),
        ]);
        assert_eq!(c.max_body_bytes, 1024);
        assert_eq!(c.multipart_max_file_bytes, 2048);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let c = config(&[
            ("BRRTR_MAX_BODY_BYTES", "lots"),
            ("BRRTR_SCHEMA_CACHE", "maybe"),
        ]);
        assert_eq!(c.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(c.schema_cache);
    }

    #[test]
    fn test_flags() {
        let c = config(&[("BRRTR_SCHEMA_CACHE", "off"), ("BRRTR_WS_EXTRA_HANDLERS", "1")]);
        assert!(!c.schema_cache);
        assert!(c.ws_extra_handlers);
        assert_eq!(c.multipart_limits().max_fields, 1000);
    }
}
