//! Cache configuration surface.
//!
//! The build-rule layer hands the cache an explicit [`CacheConfig`];
//! there is no ambient or global configuration state. The option set is
//! closed: constructing a config from serialized options rejects
//! unknown keys instead of silently ignoring them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Options recognized by the artifact cache.
///
/// Immutable for the lifetime of a coordinator instance. Defaults match
/// the behavior expected by the build-rule layer: hash everything,
/// isolate languages, cache locally with compression, no remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    /// Include schema and dependency content hashes in the fingerprint
    pub hash_inputs: bool,
    /// Include resolved toolchain versions in the fingerprint
    pub hash_tools: bool,
    /// Store entries under per-language fingerprints so languages never collide
    pub language_isolation: bool,
    /// Enable the local on-disk entry store
    pub local_cache_enabled: bool,
    /// Fall through to an attached remote backend on local miss
    pub remote_cache_enabled: bool,
    /// Compress stored artifact bytes with zstd
    pub compression_enabled: bool,
    /// Size budget for the local store; exceeding it triggers eviction
    pub max_size_mb: Option<u64>,
    /// Maximum entry age before it is eligible for expiry
    pub ttl_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hash_inputs: true,
            hash_tools: true,
            language_isolation: true,
            local_cache_enabled: true,
            remote_cache_enabled: false,
            compression_enabled: true,
            max_size_mb: None,
            ttl_seconds: None,
        }
    }
}

impl CacheConfig {
    /// Build a config from a serialized option map.
    ///
    /// Unknown keys are a configuration error, not a no-op: a typo in a
    /// build rule must surface instead of quietly changing cache
    /// behavior.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::configuration(format!("invalid cache options: {e}")))
    }

    /// Size budget in bytes, if configured.
    #[must_use]
    pub fn max_size_bytes(&self) -> Option<u64> {
        self.max_size_mb.map(|mb| mb * 1024 * 1024)
    }
}
