//! Cache coordinator façade.
//!
//! The build-rule layer talks to exactly two entry points here:
//! [`CacheCoordinator::try_lookup`] before invoking codegen, and
//! [`CacheCoordinator::store_result`] after generating fresh output.
//! The coordinator wires the key generator, entry store, eviction
//! manager, and metrics collector together and owns the
//! degrade-don't-fail policy: storage and remote problems are logged
//! and absorbed, while unreadable declared inputs and malformed keys
//! fail fast.

use protogen_core::{CacheConfig, Error, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::evict;
use crate::keys::{self, KeyInputs};
use crate::metrics::{
    CacheMetrics, HealthStatus, LookupOutcome, MetricsCollector, PerformanceReport,
};
use crate::remote::RemoteCache;
use crate::store::{Artifact, EntryDescriptor, EntryStore};

/// Abandoned staging directories older than this are reclaimed during
/// opportunistic cleanup.
const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// The default configuration handed to callers that pass no options.
#[must_use]
pub fn default_config() -> CacheConfig {
    CacheConfig::default()
}

/// Where a cache hit was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSource {
    /// Served from the local entry store
    Local,
    /// Served from the attached remote backend
    Remote,
}

/// Outcome of a coordinated lookup.
#[derive(Debug)]
pub struct LookupResult {
    /// The fingerprint the lookup was performed under
    pub fingerprint: String,
    /// Artifacts on a hit, `None` on a miss
    pub artifacts: Option<Vec<Artifact>>,
    /// Local entry descriptor, when one exists
    pub descriptor: Option<EntryDescriptor>,
    /// Hit provenance, `None` on a miss
    pub source: Option<HitSource>,
}

impl LookupResult {
    /// Whether the lookup was a hit.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.source.is_some()
    }

    fn miss(fingerprint: String) -> Self {
        Self {
            fingerprint,
            artifacts: None,
            descriptor: None,
            source: None,
        }
    }
}

/// Façade combining fingerprinting, storage, eviction, and metrics.
///
/// Configuration is immutable per instance; there is no global state.
/// The coordinator may be shared across threads; cross-process safety
/// rests on the entry store's atomic-rename discipline.
pub struct CacheCoordinator {
    config: CacheConfig,
    store: EntryStore,
    metrics: MetricsCollector,
    remote: Option<Arc<dyn RemoteCache>>,
}

impl CacheCoordinator {
    /// Create a coordinator over a cache root with the given config.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: CacheConfig) -> Self {
        Self {
            config,
            store: EntryStore::new(root),
            metrics: MetricsCollector::new(),
            remote: None,
        }
    }

    /// Attach a remote backend, consulted on local miss when
    /// `remote_cache_enabled` is set.
    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteCache>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// The configuration this coordinator was built with.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The fingerprint `try_lookup`/`store_result` would use for these
    /// inputs and language.
    pub fn fingerprint(
        &self,
        inputs: &KeyInputs,
        language: &str,
        language_options: &BTreeMap<String, String>,
    ) -> Result<String> {
        let base = keys::generate_cache_key(inputs, &self.config)?;
        if self.config.language_isolation {
            keys::generate_language_cache_key(&base, language, language_options)
        } else {
            Ok(base)
        }
    }

    /// Try to serve previously generated artifacts.
    ///
    /// Checks the local store first, then the remote backend when
    /// enabled; a remote hit is written through to the local store
    /// best-effort. The outcome is recorded in the metrics collector.
    /// Only key generation can fail here; storage and remote problems
    /// degrade to misses.
    pub fn try_lookup(
        &self,
        inputs: &KeyInputs,
        language: &str,
        language_options: &BTreeMap<String, String>,
    ) -> Result<LookupResult> {
        let fingerprint = self.fingerprint(inputs, language, language_options)?;

        if self.config.local_cache_enabled {
            match self.store.lookup(&fingerprint, language) {
                Ok(Some((artifacts, descriptor))) => {
                    self.metrics.record_lookup(language, LookupOutcome::Hit);
                    tracing::debug!(
                        fingerprint = %fingerprint,
                        language = %language,
                        "Cache hit (local)"
                    );
                    return Ok(LookupResult {
                        fingerprint,
                        artifacts: Some(artifacts),
                        descriptor: Some(descriptor),
                        source: Some(HitSource::Local),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        fingerprint = %fingerprint,
                        error = %e,
                        "Local cache lookup failed; treating as miss"
                    );
                }
            }
        }

        if self.config.remote_cache_enabled {
            if let Some(remote) = &self.remote {
                match remote.lookup(&fingerprint, language) {
                    Ok(Some(artifacts)) => {
                        self.metrics.record_lookup(language, LookupOutcome::Hit);
                        tracing::debug!(
                            fingerprint = %fingerprint,
                            language = %language,
                            backend = remote.name(),
                            "Cache hit (remote)"
                        );
                        let descriptor = self.write_through(&fingerprint, language, &artifacts);
                        return Ok(LookupResult {
                            fingerprint,
                            artifacts: Some(artifacts),
                            descriptor,
                            source: Some(HitSource::Remote),
                        });
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            backend = remote.name(),
                            error = %e,
                            "Remote cache unavailable; treating as miss"
                        );
                    }
                }
            }
        }

        self.metrics.record_lookup(language, LookupOutcome::Miss);
        Ok(LookupResult::miss(fingerprint))
    }

    /// Record freshly generated artifacts under their fingerprint.
    ///
    /// Returns the local entry descriptor on success, or `Ok(None)`
    /// when caching was disabled or the write failed non-fatally — a
    /// storage I/O error is reported but never fails the build.
    /// Invalid artifact paths and unreadable inputs still fail fast.
    pub fn store_result(
        &self,
        inputs: &KeyInputs,
        language: &str,
        language_options: &BTreeMap<String, String>,
        artifacts: &[Artifact],
    ) -> Result<Option<EntryDescriptor>> {
        let fingerprint = self.fingerprint(inputs, language, language_options)?;
        let mut descriptor = None;

        if self.config.local_cache_enabled {
            match self.store.store(
                &fingerprint,
                language,
                artifacts,
                self.config.compression_enabled,
            ) {
                Ok(d) => {
                    self.metrics.record_store();
                    descriptor = Some(d);
                    self.opportunistic_cleanup();
                }
                Err(Error::Io { .. }) => {
                    tracing::warn!(
                        fingerprint = %fingerprint,
                        language = %language,
                        "Failed to write cache entry; build proceeds uncached"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if self.config.remote_cache_enabled {
            if let Some(remote) = &self.remote {
                if let Err(e) = remote.store(&fingerprint, language, artifacts) {
                    tracing::warn!(
                        backend = remote.name(),
                        error = %e,
                        "Failed to publish entry to remote cache"
                    );
                }
            }
        }

        Ok(descriptor)
    }

    fn write_through(
        &self,
        fingerprint: &str,
        language: &str,
        artifacts: &[Artifact],
    ) -> Option<EntryDescriptor> {
        if !self.config.local_cache_enabled {
            return None;
        }
        match self.store.store(
            fingerprint,
            language,
            artifacts,
            self.config.compression_enabled,
        ) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "Failed to write remote hit through to local store"
                );
                None
            }
        }
    }

    /// Best-effort maintenance after a successful write: size-budget
    /// eviction, TTL expiry, and stale staging reclamation.
    fn opportunistic_cleanup(&self) {
        if let Some(limit) = self.config.max_size_bytes() {
            let over_budget = match self.store.statistics() {
                Ok(stats) => stats.total_size_bytes > limit,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read store statistics");
                    false
                }
            };
            if over_budget {
                match evict::cleanup_to_bytes(&self.store, limit) {
                    Ok(result) => self.metrics.record_evictions(result.entries_removed),
                    Err(e) => tracing::warn!(error = %e, "Eviction pass failed"),
                }
            }
        }

        if let Some(ttl) = self.config.ttl_seconds {
            let ttl = chrono::Duration::seconds(i64::try_from(ttl).unwrap_or(i64::MAX));
            match evict::cleanup_expired(&self.store, ttl) {
                Ok(result) => self.metrics.record_evictions(result.entries_removed),
                Err(e) => tracing::warn!(error = %e, "TTL expiry pass failed"),
            }
        }

        if let Err(e) = self.store.sweep_stale_temp(STALE_STAGING_AGE) {
            tracing::warn!(error = %e, "Stale staging sweep failed");
        }
    }

    /// Snapshot the hit/miss counters.
    #[must_use]
    pub fn get_cache_metrics(&self) -> CacheMetrics {
        self.metrics.get_cache_metrics()
    }

    /// Derive performance heuristics from the current counters.
    #[must_use]
    pub fn analyze_cache_performance(&self) -> PerformanceReport {
        self.metrics.analyze_cache_performance()
    }

    /// Weighted health summary combining counters and store usage.
    pub fn get_cache_health_status(&self) -> Result<HealthStatus> {
        let stats = self.store.statistics()?;
        Ok(self
            .metrics
            .get_cache_health_status(&stats, self.config.max_size_bytes()))
    }

    /// Reset the metrics counters. Explicit operator action only.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// The underlying entry store, for invalidation tooling.
    #[must_use]
    pub fn store(&self) -> &EntryStore {
        &self.store
    }
}
