//! Least-recently-used eviction.
//!
//! Reclaims space once the store exceeds its size budget: entries are
//! removed oldest-access-first (ties broken by creation time) until the
//! total is at or below the budget, and never one entry more than
//! necessary. Not self-concurrent — callers must not run two cleanups
//! on the same root at once — but concurrent `store`/`lookup` during a
//! cleanup is safe because entry removal is directory-delete based.

use chrono::{Duration, Utc};
use protogen_core::Result;
use serde::{Deserialize, Serialize};

use crate::store::{EntryInfo, EntryStore};

/// Result of an eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Number of entries removed
    pub entries_removed: usize,
    /// Bytes reclaimed
    pub bytes_freed: u64,
}

/// Evict least-recently-used entries until the store fits in
/// `size_limit_mb`.
pub fn cleanup(store: &EntryStore, size_limit_mb: u64) -> Result<CleanupResult> {
    cleanup_to_bytes(store, size_limit_mb * 1024 * 1024)
}

/// Evict least-recently-used entries until total size is at or below
/// `size_limit_bytes`.
pub fn cleanup_to_bytes(store: &EntryStore, size_limit_bytes: u64) -> Result<CleanupResult> {
    let mut entries = store.list_entries()?;
    let mut total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    let mut result = CleanupResult::default();
    if total <= size_limit_bytes {
        return Ok(result);
    }

    entries.sort_by_key(|e| (e.last_access_at, e.created_at));

    for entry in &entries {
        if total <= size_limit_bytes {
            break;
        }
        if remove(store, entry, "size budget exceeded") {
            total = total.saturating_sub(entry.size_bytes);
            result.entries_removed += 1;
            result.bytes_freed += entry.size_bytes;
        }
    }

    Ok(result)
}

/// Remove entries older than `ttl`, regardless of the size budget.
pub fn cleanup_expired(store: &EntryStore, ttl: Duration) -> Result<CleanupResult> {
    let cutoff = Utc::now() - ttl;
    let mut result = CleanupResult::default();

    for entry in store.list_entries()? {
        if entry.created_at < cutoff && remove(store, &entry, "ttl expired") {
            result.entries_removed += 1;
            result.bytes_freed += entry.size_bytes;
        }
    }

    Ok(result)
}

/// Remove a single entry; a failure (e.g. a concurrent writer already
/// replaced it) only skips that entry.
fn remove(store: &EntryStore, entry: &EntryInfo, reason: &str) -> bool {
    match store.invalidate(&entry.fingerprint, &entry.language) {
        Ok(removed) => {
            if removed {
                tracing::debug!(
                    fingerprint = %entry.fingerprint,
                    language = %entry.language,
                    size = entry.size_bytes,
                    reason = reason,
                    "Evicted cache entry"
                );
            }
            removed
        }
        Err(e) => {
            tracing::warn!(
                fingerprint = %entry.fingerprint,
                error = %e,
                "Failed to evict cache entry"
            );
            false
        }
    }
}
