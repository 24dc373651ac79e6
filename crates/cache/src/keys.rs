//! Deterministic fingerprint generation.
//!
//! A fingerprint is a pure function of its declared inputs: schema file
//! content hashes, transitive dependency hashes, generation options,
//! well-known-type inclusion, and resolved toolchain versions. All
//! collections are `BTreeMap`/`BTreeSet` so canonical JSON never
//! depends on iteration order.
//!
//! Language fingerprints re-hash the base fingerprint together with the
//! language tag itself, so two target languages can never produce the
//! same key even with structurally identical option maps.

use protogen_core::{CacheConfig, Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Fingerprint length in lowercase hex characters.
///
/// SHA-256 truncated to 17 bytes (136 bits). Collisions are acceptable
/// at cache-miss cost; this is not a security boundary.
pub const KEY_LEN: usize = 34;

/// Truncated digest length in bytes.
const KEY_BYTES: usize = KEY_LEN / 2;

/// Input envelope for base fingerprint computation.
///
/// Serialized as canonical JSON and hashed; any field change changes
/// the resulting key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInputs {
    /// Schema file path → SHA-256 of its contents
    pub schema_hashes: BTreeMap<String, String>,
    /// Content hashes of transitive schema dependencies
    pub dependency_hashes: BTreeSet<String>,
    /// Declared generation options
    pub options: BTreeMap<String, String>,
    /// Whether well-known types are included in generation
    pub include_well_known_types: bool,
    /// Resolved toolchain version identifiers (tool name → version)
    pub tool_versions: BTreeMap<String, String>,
}

impl KeyInputs {
    /// Build an envelope by reading and hashing the declared files.
    ///
    /// Fails fast with [`Error::InputUnavailable`] if any declared file
    /// is missing or unreadable; no fallback hash is ever synthesized.
    pub fn from_schema_files(schemas: &[PathBuf], dependencies: &[PathBuf]) -> Result<Self> {
        let mut schema_hashes = BTreeMap::new();
        for path in schemas {
            schema_hashes.insert(path.to_string_lossy().into_owned(), hash_file_contents(path)?);
        }
        let mut dependency_hashes = BTreeSet::new();
        for path in dependencies {
            dependency_hashes.insert(hash_file_contents(path)?);
        }
        Ok(Self {
            schema_hashes,
            dependency_hashes,
            options: BTreeMap::new(),
            include_well_known_types: false,
            tool_versions: BTreeMap::new(),
        })
    }
}

/// Hash a file's contents, returning the full SHA-256 hex digest.
pub fn hash_file_contents(path: &Path) -> Result<String> {
    let contents = std::fs::read(path).map_err(|e| Error::input_unavailable(e, path))?;
    Ok(hex::encode(Sha256::digest(&contents)))
}

fn truncated_hex(digest: &[u8]) -> String {
    hex::encode(&digest[..KEY_BYTES])
}

/// Compute the base (language-agnostic) fingerprint for an input set.
///
/// `hash_inputs` and `hash_tools` config flags control whether file
/// hashes and toolchain versions participate in the envelope.
pub fn generate_cache_key(inputs: &KeyInputs, config: &CacheConfig) -> Result<String> {
    let mut envelope = inputs.clone();
    if !config.hash_inputs {
        envelope.schema_hashes.clear();
        envelope.dependency_hashes.clear();
    }
    if !config.hash_tools {
        envelope.tool_versions.clear();
    }
    let bytes = serde_json::to_vec(&envelope)
        .map_err(|e| Error::serialization(format!("failed to encode key envelope: {e}")))?;
    Ok(truncated_hex(&Sha256::digest(&bytes)))
}

/// Compute a per-language fingerprint from a base fingerprint.
///
/// The language tag is part of the hashed input, so distinct languages
/// are guaranteed distinct keys regardless of their option maps.
pub fn generate_language_cache_key(
    base_fingerprint: &str,
    language: &str,
    language_options: &BTreeMap<String, String>,
) -> Result<String> {
    let options_bytes = serde_json::to_vec(language_options)
        .map_err(|e| Error::serialization(format!("failed to encode language options: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(base_fingerprint.as_bytes());
    hasher.update([0]);
    hasher.update(language.as_bytes());
    hasher.update([0]);
    hasher.update(&options_bytes);
    Ok(truncated_hex(&hasher.finalize()))
}

/// Check that `key` has the exact fingerprint shape: [`KEY_LEN`]
/// lowercase hex characters, nothing else.
#[must_use]
pub fn validate_cache_key(key: &str) -> bool {
    key.len() == KEY_LEN
        && key
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Options for bundle-level key generation.
#[derive(Debug, Clone, Default)]
pub struct BundleConfig {
    /// Also produce a bundle-level fingerprint covering the full
    /// language set, so partial bundle hits are detectable
    pub check_consistency: bool,
    /// Per-language option maps (languages absent here use no options)
    pub language_options: BTreeMap<String, BTreeMap<String, String>>,
}

/// Result of bundle key generation.
#[derive(Debug, Clone)]
pub struct BundleKeys {
    /// Language → per-language fingerprint
    pub language_keys: BTreeMap<String, String>,
    /// Fingerprint over the whole language set, when consistency
    /// checking was requested
    pub bundle_key: Option<String>,
}

/// Compute fingerprints for every language in a generation bundle.
pub fn generate_cache_key_for_bundle(
    inputs: &KeyInputs,
    languages: &[String],
    config: &CacheConfig,
    bundle_config: &BundleConfig,
) -> Result<BundleKeys> {
    let base = generate_cache_key(inputs, config)?;
    let empty = BTreeMap::new();

    let mut language_keys = BTreeMap::new();
    for language in languages {
        let options = bundle_config.language_options.get(language).unwrap_or(&empty);
        language_keys.insert(
            language.clone(),
            generate_language_cache_key(&base, language, options)?,
        );
    }

    let bundle_key = if bundle_config.check_consistency {
        let mut hasher = Sha256::new();
        for (language, key) in &language_keys {
            hasher.update(language.as_bytes());
            hasher.update([0]);
            hasher.update(key.as_bytes());
            hasher.update([0]);
        }
        Some(truncated_hex(&hasher.finalize()))
    } else {
        None
    };

    Ok(BundleKeys {
        language_keys,
        bundle_key,
    })
}
