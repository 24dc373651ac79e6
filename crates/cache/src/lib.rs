//! Content-addressed artifact caching for schema code generation
//!
//! This crate lets the build-rule layer skip redundant codegen work:
//! before invoking the schema compiler it asks the cache for a
//! previously produced result, and after generating fresh output it
//! stores the artifacts keyed by a fingerprint of everything that could
//! affect them.
//!
//! # Overview
//!
//! - [`keys`] — deterministic fingerprints over schema contents,
//!   options, and toolchain versions, with per-language isolation
//! - [`store`] — atomic on-disk entry storage with checksum-verified
//!   reads
//! - [`evict`] — least-recently-used reclamation under a size budget
//! - [`metrics`] — hit/miss accounting and health summaries
//! - [`remote`] — the seam for an optional team-shared backend
//! - [`coordinator`] — the façade combining the above into
//!   `try_lookup` / `store_result`
//!
//! # Fingerprints
//!
//! A fingerprint is SHA-256 over a canonical-JSON input envelope,
//! truncated to 17 bytes and hex-encoded: 34 lowercase hex characters.
//! Collisions cost a cache miss, nothing more; this is not a security
//! boundary.

pub mod coordinator;
pub mod evict;
pub mod keys;
pub mod metrics;
pub mod remote;
pub mod store;

pub use coordinator::{CacheCoordinator, HitSource, LookupResult, default_config};
pub use evict::CleanupResult;
pub use keys::{
    BundleConfig, BundleKeys, KEY_LEN, KeyInputs, generate_cache_key,
    generate_cache_key_for_bundle, generate_language_cache_key, validate_cache_key,
};
pub use metrics::{
    CacheMetrics, HealthLevel, HealthStatus, LanguageMetrics, LookupOutcome, MetricsCollector,
    PerformanceReport,
};
pub use remote::RemoteCache;
pub use store::{Artifact, EntryDescriptor, EntryStore, StoreStatistics};
