//! # Schema Validator Cache Module
//!
//! Thread-safe caching of compiled JSON Schema validators.
//!
//! ## Overview
//!
//! Every model field owns a compiled validator. Many handlers declare the same
//! parameter types (`{"type": "integer"}` for every `id`, the same `Item` body on
//! create and update routes), so compiling each one separately wastes startup time and
//! memory. The cache keys validators by a SHA-256 digest of the schema document and
//! hands out `Arc`s, so identical schemas compile once per process.
//!
//! ## Thread Safety
//!
//! The cache uses `Arc<RwLock<HashMap>>`:
//! - Multiple readers can look up validators simultaneously
//! - Writers take the lock only to insert a freshly compiled validator
//! - Cloning the cache clones the handle, not the contents
//!
//! Validators are only compiled at route registration, never per request.
//!
//! ## Configuration
//!
//! The cache can be disabled via `BRRTR_SCHEMA_CACHE=off`, in which case every call
//! compiles a fresh validator.

use jsonschema::JSONSchema;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Thread-safe cache for compiled JSON Schema validators
///
/// # Example
///
/// ```rust
/// use brrtrouter_args::validator_cache::ValidatorCache;
/// use serde_json::json;
///
/// let cache = ValidatorCache::new(true);
/// let schema = json!({"type": "integer", "minimum": 1});
///
/// let a = cache.get_or_compile(&schema).unwrap();
/// let b = cache.get_or_compile(&schema).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// assert_eq!(cache.size(), 1);
/// ```
#[derive(Clone)]
pub struct ValidatorCache {
    /// Internal cache storage: schema digest -> compiled validator
    cache: Arc<RwLock<HashMap<String, Arc<JSONSchema>>>>,
    /// Whether the cache is enabled (from BRRTR_SCHEMA_CACHE env var)
    enabled: bool,
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("enabled", &self.enabled)
            .field("size", &self.size())
            .finish()
    }
}

impl Default for ValidatorCache {
    fn default() -> Self {
        ValidatorCache::new(true)
    }
}

impl ValidatorCache {
    /// Create a new validator cache
    ///
    /// # Arguments
    ///
    /// * `enabled` - Whether the cache should be active (from `ArgsConfig`)
    pub fn new(enabled: bool) -> Self {
        info!(enabled = enabled, "Initializing JSON Schema validator cache");
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            enabled,
        }
    }

    /// SHA-256 of the schema's JSON text, first 16 hex chars.
    ///
    /// `serde_json` keeps object keys sorted (no `preserve_order`), so structurally equal
    /// schemas produce the same text.
    pub fn schema_key(schema: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(schema.to_string().as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        hash.chars().take(16).collect()
    }

    /// Get a cached validator or compile and cache a new one
    ///
    /// # Errors
    ///
    /// Returns the compiler's message when the schema is not a valid JSON Schema.
    ///
    /// # Performance
    ///
    /// - Cache hit: read lock + HashMap lookup
    /// - Cache miss: write lock + compilation
    pub fn get_or_compile(&self, schema: &Value) -> Result<Arc<JSONSchema>, String> {
        if !self.enabled {
            return JSONSchema::compile(schema)
                .map(Arc::new)
                .map_err(|e| e.to_string());
        }

        let key = Self::schema_key(schema);

        // Fast path: read lock only
        {
            let cache = self.cache.read().map_err(|_| "validator cache lock poisoned")?;
            if let Some(validator) = cache.get(&key) {
                debug!(cache_key = %key, "Schema validator cache hit");
                return Ok(Arc::clone(validator));
            }
        }

        let compiled = Arc::new(JSONSchema::compile(schema).map_err(|e| e.to_string())?);
        let mut cache = self.cache.write().map_err(|_| "validator cache lock poisoned")?;

        // Another registration may have compiled the same schema while we waited
        if let Some(existing) = cache.get(&key) {
            return Ok(Arc::clone(existing));
        }

        cache.insert(key.clone(), Arc::clone(&compiled));
        debug!(
            cache_key = %key,
            cache_size = cache.len(),
            "Schema validator compiled and cached"
        );
        Ok(compiled)
    }

    /// Number of cached validators
    pub fn size(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drop every cached validator. Models built earlier keep their own `Arc`s.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            let dropped = cache.len();
            cache.clear();
            info!(dropped = dropped, "Schema validator cache cleared");
        }
    }
}
