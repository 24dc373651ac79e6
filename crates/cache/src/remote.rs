//! Seam for an optional team-shared cache backend.
//!
//! The coordinator consults a [`RemoteCache`] only after a local miss,
//! and treats every backend error — timeout included — as a miss, never
//! as a build failure. The wire protocol is the backend's business;
//! this crate only fixes the contract.

use protogen_core::Result;

use crate::store::Artifact;

/// A remote cache backend behind the same lookup/store contract as the
/// local entry store.
///
/// Implementations must bound their own network I/O with a timeout and
/// surface it as an error; the coordinator downgrades any error to a
/// miss. Artifacts returned from `lookup` must be the uncompressed
/// bytes originally stored.
pub trait RemoteCache: Send + Sync {
    /// Fetch the artifacts stored under a fingerprint, if any.
    fn lookup(&self, fingerprint: &str, language: &str) -> Result<Option<Vec<Artifact>>>;

    /// Publish artifacts under a fingerprint.
    fn store(&self, fingerprint: &str, language: &str, artifacts: &[Artifact]) -> Result<()>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}
