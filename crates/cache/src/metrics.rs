//! Hit/miss accounting and cache health summaries.
//!
//! Counters are only ever mutated through recorded lookup/store/evict
//! outcomes and reset only by explicit operator action. A cloned
//! collector shares state, so the coordinator and observability tooling
//! see the same numbers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::store::StoreStatistics;

/// Outcome of a recorded cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Artifacts were served from the cache
    Hit,
    /// The cache had nothing usable
    Miss,
}

#[derive(Debug, Default)]
struct LanguageCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Default)]
struct MetricsState {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
    per_language: RwLock<BTreeMap<String, Arc<LanguageCounters>>>,
}

/// Shared counter state for cache observability.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    state: Arc<MetricsState>,
}

/// Per-language slice of a metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanguageMetrics {
    /// Lookups served from cache for this language
    pub hits: u64,
    /// Lookups that missed for this language
    pub misses: u64,
    /// Hit percentage over this language's lookups
    pub hit_rate: f64,
}

/// Point-in-time snapshot of the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetrics {
    /// Hit percentage over all lookups; `0.0` when there are none
    pub hit_rate: f64,
    /// Miss percentage; `hit_rate + miss_rate == 100` when lookups exist
    pub miss_rate: f64,
    /// Total recorded lookups
    pub total_lookups: u64,
    /// Total recorded hits
    pub hits: u64,
    /// Total recorded misses
    pub misses: u64,
    /// Total recorded stores
    pub stores: u64,
    /// Total entries removed by eviction passes
    pub evictions: u64,
    /// Per-language breakdown
    pub language_breakdown: BTreeMap<String, LanguageMetrics>,
}

/// Simple performance heuristics derived from a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Overall metrics the report was derived from
    pub overall: CacheMetrics,
    /// Per-language metrics for the same window
    pub language_performance: BTreeMap<String, LanguageMetrics>,
    /// Languages whose hit rate is an outlier below the overall rate
    pub bottlenecks: Vec<String>,
    /// Human-readable tuning suggestions
    pub optimization_opportunities: Vec<String>,
}

/// Coarse health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    /// Cache is performing well
    Healthy,
    /// Cache works but is underperforming
    Degraded,
    /// Cache is providing little value or is under pressure
    Unhealthy,
}

/// Weighted health summary for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Weighted score clamped to 0–100
    pub health_score: f64,
    /// Classification derived from the score
    pub status: HealthLevel,
    /// Actionable recommendations, possibly empty
    pub recommendations: Vec<String>,
}

/// A language needs at least this many lookups before it can be flagged
/// as a bottleneck.
const BOTTLENECK_MIN_LOOKUPS: u64 = 10;

/// How far below the overall hit rate a language must fall to count as
/// an outlier, in percentage points.
const BOTTLENECK_MARGIN: f64 = 20.0;

impl MetricsCollector {
    /// Create a collector with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one lookup, globally and per language.
    pub fn record_lookup(&self, language: &str, outcome: LookupOutcome) {
        let counters = self.language_counters(language);
        match outcome {
            LookupOutcome::Hit => {
                self.state.hits.fetch_add(1, Ordering::Relaxed);
                counters.hits.fetch_add(1, Ordering::Relaxed);
            }
            LookupOutcome::Miss => {
                self.state.misses.fetch_add(1, Ordering::Relaxed);
                counters.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a successful cache write.
    pub fn record_store(&self) {
        self.state.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Record entries removed by an eviction pass.
    pub fn record_evictions(&self, entries_removed: usize) {
        self.state
            .evictions
            .fetch_add(entries_removed as u64, Ordering::Relaxed);
    }

    /// Reset all counters to zero. Explicit operator action only.
    pub fn reset(&self) {
        self.state.hits.store(0, Ordering::Relaxed);
        self.state.misses.store(0, Ordering::Relaxed);
        self.state.stores.store(0, Ordering::Relaxed);
        self.state.evictions.store(0, Ordering::Relaxed);
        if let Ok(mut map) = self.state.per_language.write() {
            map.clear();
        }
    }

    fn language_counters(&self, language: &str) -> Arc<LanguageCounters> {
        if let Ok(map) = self.state.per_language.read() {
            if let Some(counters) = map.get(language) {
                return Arc::clone(counters);
            }
        }
        let mut map = match self.state.per_language.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(map.entry(language.to_string()).or_default())
    }

    /// Snapshot the counters.
    ///
    /// `hit_rate + miss_rate` is exactly `100.0` whenever any lookup has
    /// been recorded; both are `0.0` (never NaN) on an empty window.
    #[must_use]
    pub fn get_cache_metrics(&self) -> CacheMetrics {
        let hits = self.state.hits.load(Ordering::Relaxed);
        let misses = self.state.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = percentage(hits, total);
        let miss_rate = if total == 0 { 0.0 } else { 100.0 - hit_rate };

        let language_breakdown = match self.state.per_language.read() {
            Ok(map) => map
                .iter()
                .map(|(language, counters)| {
                    let lang_hits = counters.hits.load(Ordering::Relaxed);
                    let lang_misses = counters.misses.load(Ordering::Relaxed);
                    (
                        language.clone(),
                        LanguageMetrics {
                            hits: lang_hits,
                            misses: lang_misses,
                            hit_rate: percentage(lang_hits, lang_hits + lang_misses),
                        },
                    )
                })
                .collect(),
            Err(_) => BTreeMap::new(),
        };

        CacheMetrics {
            hit_rate,
            miss_rate,
            total_lookups: total,
            hits,
            misses,
            stores: self.state.stores.load(Ordering::Relaxed),
            evictions: self.state.evictions.load(Ordering::Relaxed),
            language_breakdown,
        }
    }

    /// Derive bottleneck and tuning heuristics from the current window.
    #[must_use]
    pub fn analyze_cache_performance(&self) -> PerformanceReport {
        let overall = self.get_cache_metrics();

        let bottlenecks: Vec<String> = overall
            .language_breakdown
            .iter()
            .filter(|(_, lang)| {
                lang.hits + lang.misses >= BOTTLENECK_MIN_LOOKUPS
                    && lang.hit_rate + BOTTLENECK_MARGIN < overall.hit_rate
            })
            .map(|(language, _)| language.clone())
            .collect();

        let mut optimization_opportunities = Vec::new();
        for language in &bottlenecks {
            optimization_opportunities.push(format!(
                "hit rate for {language} is well below the overall rate; check for unstable options or tool versions in its rules"
            ));
        }
        if overall.total_lookups >= BOTTLENECK_MIN_LOOKUPS && overall.hit_rate < 50.0 {
            optimization_opportunities.push(
                "overall hit rate is below 50%; inputs may include volatile values such as timestamps"
                    .to_string(),
            );
        }
        if overall.evictions > overall.stores / 2 && overall.stores > 0 {
            optimization_opportunities
                .push("evictions are frequent relative to writes; consider raising max_size_mb".to_string());
        }

        PerformanceReport {
            language_performance: overall.language_breakdown.clone(),
            overall,
            bottlenecks,
            optimization_opportunities,
        }
    }

    /// Weighted health summary: hit rate (50%), eviction pressure (25%),
    /// storage headroom (25%), clamped to 0–100.
    #[must_use]
    pub fn get_cache_health_status(
        &self,
        stats: &StoreStatistics,
        max_size_bytes: Option<u64>,
    ) -> HealthStatus {
        let metrics = self.get_cache_metrics();

        // An idle cache is not unhealthy; score the hit component
        // neutrally until there is data.
        let hit_component = if metrics.total_lookups == 0 {
            100.0
        } else {
            metrics.hit_rate
        };

        let eviction_pressure = if metrics.total_lookups == 0 {
            0.0
        } else {
            (metrics.evictions as f64 / metrics.total_lookups as f64 * 100.0).min(100.0)
        };

        let headroom = match max_size_bytes {
            Some(limit) if limit > 0 => {
                let used = stats.total_size_bytes as f64 / limit as f64;
                ((1.0 - used) * 100.0).clamp(0.0, 100.0)
            }
            _ => 100.0,
        };

        let health_score = (0.5 * hit_component + 0.25 * (100.0 - eviction_pressure)
            + 0.25 * headroom)
            .clamp(0.0, 100.0);

        let status = if health_score >= 80.0 {
            HealthLevel::Healthy
        } else if health_score >= 50.0 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Unhealthy
        };

        let mut recommendations = Vec::new();
        if metrics.total_lookups > 0 && metrics.hit_rate < 50.0 {
            recommendations.push(
                "hit rate is low; verify that generation options are stable across runs"
                    .to_string(),
            );
        }
        if eviction_pressure > 25.0 {
            recommendations
                .push("evictions are churning the cache; raise the size budget".to_string());
        }
        if headroom < 10.0 {
            recommendations.push(
                "store is near its size budget; the next writes will trigger eviction".to_string(),
            );
        }

        HealthStatus {
            health_score,
            status,
            recommendations,
        }
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
