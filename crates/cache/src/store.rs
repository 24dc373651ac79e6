//! Atomic on-disk entry storage.
//!
//! Entries live at `{root}/{language}/{fingerprint}/` as plain artifact
//! files plus a `metadata.json` sidecar. Writes stage into a
//! `{fingerprint}.tmp-<uuid>` sibling and commit with a single
//! `fs::rename`, so a reader observes either no entry or a complete,
//! checksum-valid one. The rename is the sole correctness mechanism:
//! callers may be independent OS processes and no in-process lock is
//! assumed. Two writers racing on one fingerprint are fine; the last
//! successful rename wins and is internally consistent.

use chrono::{DateTime, Utc};
use protogen_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::keys::validate_cache_key;

/// Metadata sidecar file name inside each entry directory.
const METADATA_FILE: &str = "metadata.json";

/// Marker embedded in staging directory names.
const TMP_MARKER: &str = ".tmp-";

/// zstd compression level for stored artifacts.
const COMPRESSION_LEVEL: i32 = 3;

/// One generated artifact: a path relative to the entry root plus its
/// (uncompressed) bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path of the artifact within the entry, e.g. `user.pb.go`
    pub rel_path: String,
    /// Uncompressed artifact contents
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Create an artifact from a relative path and contents.
    #[must_use]
    pub fn new(rel_path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            rel_path: rel_path.into(),
            bytes: bytes.into(),
        }
    }
}

/// Metadata sidecar persisted next to the artifact files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    fingerprint: String,
    language: String,
    created_at: DateTime<Utc>,
    last_access_at: DateTime<Utc>,
    size_bytes: u64,
    compression_used: bool,
    checksum: String,
}

/// Public view of a committed entry.
#[derive(Debug, Clone)]
pub struct EntryDescriptor {
    /// The entry's fingerprint
    pub fingerprint: String,
    /// Target language the entry belongs to
    pub language: String,
    /// Committed entry directory
    pub path: PathBuf,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// When the entry was last served by a lookup
    pub last_access_at: DateTime<Utc>,
    /// On-disk size of the stored artifact bytes
    pub size_bytes: u64,
    /// Whether artifact bytes are zstd-compressed on disk
    pub compression_used: bool,
    /// SHA-256 over the sorted, uncompressed artifact contents
    pub checksum: String,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatistics {
    /// Number of committed entries across all languages
    pub total_entries: usize,
    /// Total on-disk bytes of committed entries (including sidecars)
    pub total_size_bytes: u64,
}

/// A committed entry as seen by the eviction manager.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// The entry's fingerprint
    pub fingerprint: String,
    /// Target language the entry belongs to
    pub language: String,
    /// Committed entry directory
    pub path: PathBuf,
    /// Creation timestamp from the sidecar
    pub created_at: DateTime<Utc>,
    /// Last-access timestamp from the sidecar
    pub last_access_at: DateTime<Utc>,
    /// On-disk size of the entry directory
    pub size_bytes: u64,
}

/// Filesystem-backed entry store.
///
/// The store is the only code path permitted to mutate the cache root.
#[derive(Debug, Clone)]
pub struct EntryStore {
    root: PathBuf,
}

impl EntryStore {
    /// Create a store over the given cache root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root this store mutates.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, language: &str, fingerprint: &str) -> PathBuf {
        self.root.join(language).join(fingerprint)
    }

    /// Write an entry atomically.
    ///
    /// Artifacts are staged into a uniquely named temporary directory
    /// and committed with a single rename; a half-written entry is
    /// never visible. Fails fast with [`Error::InvalidKey`] on a
    /// malformed fingerprint.
    pub fn store(
        &self,
        fingerprint: &str,
        language: &str,
        artifacts: &[Artifact],
        compress: bool,
    ) -> Result<EntryDescriptor> {
        check_fingerprint(fingerprint)?;
        check_language(language)?;
        let sorted = sorted_artifacts(artifacts)?;

        let lang_dir = self.root.join(language);
        fs::create_dir_all(&lang_dir).map_err(|e| Error::io(e, &lang_dir, "create_dir_all"))?;

        let staging = lang_dir.join(format!(
            "{fingerprint}{TMP_MARKER}{}",
            uuid::Uuid::new_v4().simple()
        ));

        let meta = match self.write_staged(&staging, fingerprint, language, &sorted, compress) {
            Ok(meta) => meta,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let final_path = self.entry_path(language, fingerprint);
        // A previous entry for this fingerprint is replaced wholesale;
        // on a writer race the last rename wins.
        let _ = fs::remove_dir_all(&final_path);
        if let Err(e) = fs::rename(&staging, &final_path) {
            let _ = fs::remove_dir_all(&staging);
            return Err(Error::io(e, &final_path, "rename"));
        }

        tracing::debug!(
            fingerprint = %fingerprint,
            language = %language,
            size = meta.size_bytes,
            compressed = compress,
            "Committed cache entry"
        );

        Ok(descriptor_from_meta(&meta, final_path))
    }

    fn write_staged(
        &self,
        staging: &Path,
        fingerprint: &str,
        language: &str,
        artifacts: &[&Artifact],
        compress: bool,
    ) -> Result<EntryMeta> {
        fs::create_dir_all(staging).map_err(|e| Error::io(e, staging, "create_dir_all"))?;

        let mut stored_bytes = 0u64;
        for artifact in artifacts {
            let dest = staging.join(&artifact.rel_path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
            }
            let bytes = if compress {
                zstd::encode_all(&artifact.bytes[..], COMPRESSION_LEVEL)
                    .map_err(|e| Error::io(e, &dest, "compress"))?
            } else {
                artifact.bytes.clone()
            };
            stored_bytes += bytes.len() as u64;
            fs::write(&dest, bytes).map_err(|e| Error::io(e, &dest, "write"))?;
        }

        let now = Utc::now();
        let meta = EntryMeta {
            fingerprint: fingerprint.to_string(),
            language: language.to_string(),
            created_at: now,
            last_access_at: now,
            size_bytes: stored_bytes,
            compression_used: compress,
            checksum: compute_checksum(artifacts),
        };
        write_meta(&staging.join(METADATA_FILE), &meta)?;
        Ok(meta)
    }

    /// Read an entry's artifacts, verifying the stored checksum.
    ///
    /// Returns `Ok(None)` when the entry or its sidecar is absent, or
    /// when the on-disk bytes fail verification; a corrupt entry is
    /// auto-invalidated so it cannot keep failing lookups. On success,
    /// the entry's last-access timestamp is refreshed best-effort.
    pub fn lookup(
        &self,
        fingerprint: &str,
        language: &str,
    ) -> Result<Option<(Vec<Artifact>, EntryDescriptor)>> {
        check_fingerprint(fingerprint)?;
        check_language(language)?;

        let entry_dir = self.entry_path(language, fingerprint);
        let meta_path = entry_dir.join(METADATA_FILE);
        if !meta_path.exists() {
            return Ok(None);
        }

        let Some(mut meta) = read_meta(&meta_path) else {
            self.discard_corrupt(fingerprint, language, &entry_dir, "unreadable metadata sidecar");
            return Ok(None);
        };

        let Some(artifacts) = read_artifacts(&entry_dir, meta.compression_used) else {
            self.discard_corrupt(fingerprint, language, &entry_dir, "unreadable artifact bytes");
            return Ok(None);
        };

        let refs: Vec<&Artifact> = artifacts.iter().collect();
        let checksum = compute_checksum(&refs);
        if checksum != meta.checksum {
            self.discard_corrupt(fingerprint, language, &entry_dir, "checksum mismatch");
            return Ok(None);
        }

        meta.last_access_at = Utc::now();
        if let Err(e) = write_meta(&meta_path, &meta) {
            tracing::debug!(
                fingerprint = %fingerprint,
                error = %e,
                "Failed to refresh last-access timestamp"
            );
        }

        Ok(Some((artifacts, descriptor_from_meta(&meta, entry_dir))))
    }

    fn discard_corrupt(&self, fingerprint: &str, language: &str, entry_dir: &Path, reason: &str) {
        tracing::warn!(
            fingerprint = %fingerprint,
            language = %language,
            reason = reason,
            "Discarding corrupt cache entry"
        );
        let _ = fs::remove_dir_all(entry_dir);
    }

    /// Remove an entry. Returns `Ok(false)` if nothing was present;
    /// invalidating an absent entry is not an error.
    pub fn invalidate(&self, fingerprint: &str, language: &str) -> Result<bool> {
        check_fingerprint(fingerprint)?;
        check_language(language)?;
        let entry_dir = self.entry_path(language, fingerprint);
        if !entry_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&entry_dir).map_err(|e| Error::io(e, &entry_dir, "remove_dir_all"))?;
        Ok(true)
    }

    /// Walk the store root and aggregate entry count and total bytes.
    ///
    /// Staging directories are excluded; safe to call concurrently with
    /// readers.
    pub fn statistics(&self) -> Result<StoreStatistics> {
        let entries = self.list_entries()?;
        Ok(StoreStatistics {
            total_entries: entries.len(),
            total_size_bytes: entries.iter().map(|e| e.size_bytes).sum(),
        })
    }

    /// List all committed entries across all languages.
    ///
    /// Entries with an unreadable sidecar are skipped; they will be
    /// discarded by the next lookup that touches them.
    pub fn list_entries(&self) -> Result<Vec<EntryInfo>> {
        let mut entries = Vec::new();
        if !self.root.exists() {
            return Ok(entries);
        }

        for lang_entry in fs::read_dir(&self.root).map_err(|e| Error::io(e, &self.root, "read_dir"))? {
            let lang_entry = lang_entry.map_err(|e| Error::io(e, &self.root, "read_dir_entry"))?;
            let lang_dir = lang_entry.path();
            if !lang_dir.is_dir() {
                continue;
            }
            let language = lang_entry.file_name().to_string_lossy().into_owned();

            for entry in fs::read_dir(&lang_dir).map_err(|e| Error::io(e, &lang_dir, "read_dir"))? {
                let entry = entry.map_err(|e| Error::io(e, &lang_dir, "read_dir_entry"))?;
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if !path.is_dir() || name.contains(TMP_MARKER) {
                    continue;
                }
                let Some(meta) = read_meta(&path.join(METADATA_FILE)) else {
                    continue;
                };
                entries.push(EntryInfo {
                    fingerprint: name,
                    language: language.clone(),
                    size_bytes: directory_size(&path)?,
                    path,
                    created_at: meta.created_at,
                    last_access_at: meta.last_access_at,
                });
            }
        }

        Ok(entries)
    }

    /// Remove abandoned staging directories older than `older_than`.
    ///
    /// A writer killed mid-store leaves its staging directory behind;
    /// it is invisible to readers but still consumes space.
    pub fn sweep_stale_temp(&self, older_than: Duration) -> Result<usize> {
        let mut removed = 0;
        if !self.root.exists() {
            return Ok(removed);
        }

        for lang_entry in fs::read_dir(&self.root).map_err(|e| Error::io(e, &self.root, "read_dir"))? {
            let lang_entry = lang_entry.map_err(|e| Error::io(e, &self.root, "read_dir_entry"))?;
            let lang_dir = lang_entry.path();
            if !lang_dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&lang_dir).map_err(|e| Error::io(e, &lang_dir, "read_dir"))? {
                let entry = entry.map_err(|e| Error::io(e, &lang_dir, "read_dir_entry"))?;
                let path = entry.path();
                if !path.is_dir() || !entry.file_name().to_string_lossy().contains(TMP_MARKER) {
                    continue;
                }
                let stale = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|mtime| mtime.elapsed().ok())
                    .is_some_and(|age| age > older_than);
                if stale && fs::remove_dir_all(&path).is_ok() {
                    tracing::debug!(path = %path.display(), "Removed stale staging directory");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

fn check_fingerprint(fingerprint: &str) -> Result<()> {
    if validate_cache_key(fingerprint) {
        Ok(())
    } else {
        Err(Error::invalid_key(fingerprint))
    }
}

fn check_language(language: &str) -> Result<()> {
    let valid = !language.is_empty()
        && language
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "invalid language tag: {language:?}"
        )))
    }
}

/// Validate and sort artifacts by relative path.
fn sorted_artifacts(artifacts: &[Artifact]) -> Result<Vec<&Artifact>> {
    for artifact in artifacts {
        check_rel_path(&artifact.rel_path)?;
    }
    let mut sorted: Vec<&Artifact> = artifacts.iter().collect();
    sorted.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    if sorted
        .windows(2)
        .any(|pair| pair[0].rel_path == pair[1].rel_path)
    {
        return Err(Error::configuration("duplicate artifact rel_path"));
    }
    Ok(sorted)
}

fn check_rel_path(rel_path: &str) -> Result<()> {
    let path = Path::new(rel_path);
    let normal_only = !rel_path.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    // The sidecar name and its staging variants are reserved; readers
    // skip that whole prefix.
    if !normal_only || rel_path.starts_with(METADATA_FILE) {
        return Err(Error::configuration(format!(
            "invalid artifact path: {rel_path:?}"
        )));
    }
    Ok(())
}

/// Checksum over the logical (uncompressed) artifact set.
///
/// Hashes `rel_path NUL bytes NUL` per artifact in sorted order, so the
/// value is independent of the on-disk compression choice.
fn compute_checksum(sorted: &[&Artifact]) -> String {
    let mut hasher = Sha256::new();
    for artifact in sorted {
        hasher.update(artifact.rel_path.as_bytes());
        hasher.update([0]);
        hasher.update(&artifact.bytes);
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())
}

fn descriptor_from_meta(meta: &EntryMeta, path: PathBuf) -> EntryDescriptor {
    EntryDescriptor {
        fingerprint: meta.fingerprint.clone(),
        language: meta.language.clone(),
        path,
        created_at: meta.created_at,
        last_access_at: meta.last_access_at,
        size_bytes: meta.size_bytes,
        compression_used: meta.compression_used,
        checksum: meta.checksum.clone(),
    }
}

fn read_meta(meta_path: &Path) -> Option<EntryMeta> {
    let content = fs::read_to_string(meta_path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write the sidecar via a temporary file and rename, so concurrent
/// readers never see a truncated sidecar.
fn write_meta(meta_path: &Path, meta: &EntryMeta) -> Result<()> {
    let json = serde_json::to_vec_pretty(meta)
        .map_err(|e| Error::serialization(format!("failed to serialize entry metadata: {e}")))?;
    let tmp = meta_path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| Error::io(e, &tmp, "write"))?;
    fs::rename(&tmp, meta_path).map_err(|e| Error::io(e, meta_path, "rename"))?;
    Ok(())
}

/// Read all artifact files under an entry directory, decompressing if
/// needed. Returns `None` on any read or decode failure.
fn read_artifacts(entry_dir: &Path, compressed: bool) -> Option<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for entry in walkdir::WalkDir::new(entry_dir) {
        let entry = entry.ok()?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let rel = path.strip_prefix(entry_dir).ok()?;
        let rel_path = rel.to_string_lossy().into_owned();
        // Skips the sidecar and any staging file a crashed last-access
        // refresh left behind; those are bookkeeping, not artifacts.
        if rel_path.starts_with(METADATA_FILE) {
            continue;
        }
        let raw = fs::read(path).ok()?;
        let bytes = if compressed {
            zstd::decode_all(&raw[..]).ok()?
        } else {
            raw
        };
        artifacts.push(Artifact { rel_path, bytes });
    }
    artifacts.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Some(artifacts)
}

fn directory_size(path: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.map_err(|e| walk_error(e, path))?;
        if entry.path().is_file() {
            total += entry.metadata().map_err(|e| walk_error(e, path))?.len();
        }
    }
    Ok(total)
}

fn walk_error(e: walkdir::Error, path: &Path) -> Error {
    match e.into_io_error() {
        Some(io) => Error::io(io, path, "walk"),
        None => Error::configuration(format!("filesystem loop under {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fingerprint(seed: u8) -> String {
        format!("{seed:02x}").repeat(17)
    }

    fn sample_artifacts() -> Vec<Artifact> {
        vec![
            Artifact::new("user.pb.go", b"package userpb\n".to_vec()),
            Artifact::new("order/order.pb.go", b"package orderpb\n".to_vec()),
        ]
    }

    #[test]
    fn store_then_lookup_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0xde);

        let descriptor = store.store(&key, "go", &sample_artifacts(), false).unwrap();
        assert_eq!(descriptor.fingerprint, key);
        assert_eq!(descriptor.language, "go");
        assert!(!descriptor.compression_used);

        let (artifacts, looked_up) = store.lookup(&key, "go").unwrap().unwrap();
        assert_eq!(artifacts.len(), 2);
        // Sorted by rel_path
        assert_eq!(artifacts[0].rel_path, "order/order.pb.go");
        assert_eq!(artifacts[0].bytes, b"package orderpb\n");
        assert_eq!(artifacts[1].rel_path, "user.pb.go");
        assert_eq!(artifacts[1].bytes, b"package userpb\n");
        assert_eq!(looked_up.checksum, descriptor.checksum);
    }

    #[test]
    fn compressed_round_trip_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x11);
        let artifacts = vec![Artifact::new("big.pb.go", vec![b'x'; 64 * 1024])];

        let descriptor = store.store(&key, "go", &artifacts, true).unwrap();
        assert!(descriptor.compression_used);
        assert!(
            descriptor.size_bytes < 64 * 1024,
            "repetitive bytes should compress"
        );

        let (read_back, _) = store.lookup(&key, "go").unwrap().unwrap();
        assert_eq!(read_back[0].bytes, artifacts[0].bytes);
    }

    #[test]
    fn checksum_is_independent_of_compression() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let plain = store
            .store(&fingerprint(0x21), "go", &sample_artifacts(), false)
            .unwrap();
        let compressed = store
            .store(&fingerprint(0x22), "go", &sample_artifacts(), true)
            .unwrap();
        assert_eq!(plain.checksum, compressed.checksum);
    }

    #[test]
    fn lookup_absent_entry_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        assert!(store.lookup(&fingerprint(0x01), "go").unwrap().is_none());
    }

    #[test]
    fn lookup_without_sidecar_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x02);
        fs::create_dir_all(tmp.path().join("go").join(&key)).unwrap();
        assert!(store.lookup(&key, "go").unwrap().is_none());
    }

    #[test]
    fn corrupted_artifact_is_a_miss_and_auto_invalidated() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x03);
        let descriptor = store.store(&key, "go", &sample_artifacts(), false).unwrap();

        fs::write(descriptor.path.join("user.pb.go"), b"tampered").unwrap();

        assert!(store.lookup(&key, "go").unwrap().is_none());
        assert!(
            !descriptor.path.exists(),
            "corrupt entry must not keep failing lookups"
        );
    }

    #[test]
    fn leftover_sidecar_staging_file_does_not_poison_lookup() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x14);
        let descriptor = store.store(&key, "go", &sample_artifacts(), false).unwrap();

        // A reader killed between writing and renaming the refreshed
        // sidecar leaves its staging file inside the entry directory.
        fs::write(descriptor.path.join("metadata.json.tmp"), b"half-written").unwrap();

        let (artifacts, _) = store
            .lookup(&key, "go")
            .unwrap()
            .expect("entry with artifacts intact must still be a hit");
        assert_eq!(artifacts.len(), 2);
        assert!(descriptor.path.exists(), "valid entry must not be discarded");
    }

    #[test]
    fn rejects_artifact_named_like_sidecar_staging() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let artifacts = vec![Artifact::new("metadata.json.tmp", b"x".to_vec())];
        assert!(store
            .store(&fingerprint(0x15), "go", &artifacts, false)
            .is_err());
    }

    #[test]
    fn corrupted_sidecar_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x04);
        let descriptor = store.store(&key, "go", &sample_artifacts(), false).unwrap();

        fs::write(descriptor.path.join(METADATA_FILE), b"{ not json").unwrap();
        assert!(store.lookup(&key, "go").unwrap().is_none());
    }

    #[test]
    fn languages_are_isolated_on_disk() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x05);
        store.store(&key, "go", &sample_artifacts(), false).unwrap();

        assert!(store.lookup(&key, "python").unwrap().is_none());
        assert!(store.lookup(&key, "go").unwrap().is_some());
    }

    #[test]
    fn invalidate_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x06);

        assert!(!store.invalidate(&key, "python").unwrap());
        store
            .store(&key, "python", &sample_artifacts(), false)
            .unwrap();
        assert!(store.invalidate(&key, "python").unwrap());
        assert!(!store.invalidate(&key, "python").unwrap());
    }

    #[test]
    fn rejects_invalid_fingerprints() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let result = store.store("not-a-key", "go", &sample_artifacts(), false);
        assert!(matches!(result, Err(Error::InvalidKey { .. })));
        let result = store.lookup("DEADBEEF", "go");
        assert!(matches!(result, Err(Error::InvalidKey { .. })));
    }

    #[test]
    fn rejects_path_traversal_and_sidecar_collision() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x07);

        for bad in ["../escape.go", "/abs.go", METADATA_FILE, ""] {
            let result = store.store(&key, "go", &[Artifact::new(bad, b"x".to_vec())], false);
            assert!(result.is_err(), "rel_path {bad:?} must be rejected");
        }
    }

    #[test]
    fn rejects_duplicate_rel_paths() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let artifacts = vec![
            Artifact::new("a.pb.go", b"one".to_vec()),
            Artifact::new("a.pb.go", b"two".to_vec()),
        ];
        assert!(store
            .store(&fingerprint(0x08), "go", &artifacts, false)
            .is_err());
    }

    #[test]
    fn statistics_counts_committed_entries_only() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        store
            .store(&fingerprint(0x0a), "go", &sample_artifacts(), false)
            .unwrap();
        store
            .store(&fingerprint(0x0b), "python", &sample_artifacts(), false)
            .unwrap();
        // A staging dir must not count
        fs::create_dir_all(
            tmp.path()
                .join("go")
                .join(format!("{}{TMP_MARKER}abc", fingerprint(0x0c))),
        )
        .unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert!(stats.total_size_bytes > 0);
    }

    #[test]
    fn lookup_refreshes_last_access() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x0d);
        let stored = store.store(&key, "go", &sample_artifacts(), false).unwrap();

        std::thread::sleep(Duration::from_millis(10));
        let (_, after) = store.lookup(&key, "go").unwrap().unwrap();
        assert!(after.last_access_at > stored.last_access_at);
        assert_eq!(after.created_at, stored.created_at);
    }

    #[test]
    fn second_store_replaces_first() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x0e);

        store
            .store(&key, "go", &[Artifact::new("gen.go", b"v1".to_vec())], false)
            .unwrap();
        store
            .store(&key, "go", &[Artifact::new("gen.go", b"v2".to_vec())], false)
            .unwrap();

        let (artifacts, _) = store.lookup(&key, "go").unwrap().unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].bytes, b"v2");
    }

    #[test]
    fn no_staging_dirs_left_after_store() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        store
            .store(&fingerprint(0x0f), "go", &sample_artifacts(), false)
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path().join("go"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(TMP_MARKER))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn sweep_removes_only_stale_staging_dirs() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let committed = store
            .store(&fingerprint(0x10), "go", &sample_artifacts(), false)
            .unwrap();
        let stale = tmp
            .path()
            .join("go")
            .join(format!("{}{TMP_MARKER}dead", fingerprint(0x12)));
        fs::create_dir_all(&stale).unwrap();

        // Fresh staging dirs survive a sweep with a large threshold
        assert_eq!(
            store.sweep_stale_temp(Duration::from_secs(3600)).unwrap(),
            0
        );
        // With a zero threshold the abandoned dir is reclaimed
        assert_eq!(store.sweep_stale_temp(Duration::ZERO).unwrap(), 1);
        assert!(!stale.exists());
        assert!(committed.path.exists());
    }

    #[test]
    fn empty_artifact_set_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = EntryStore::new(tmp.path());
        let key = fingerprint(0x13);
        store.store(&key, "go", &[], false).unwrap();
        let (artifacts, _) = store.lookup(&key, "go").unwrap().unwrap();
        assert!(artifacts.is_empty());
    }
}
