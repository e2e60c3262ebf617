//! Content store interface
//!
//! The deployment engine never talks to an object database directly. It
//! resolves refs to checksums, makes sure the commit is local, materializes
//! it into a checkout directory and occasionally asks for garbage collection,
//! all through [`ContentStore`].
//!
//! [`GitStore`] is the bundled implementation, a bare git repository kept
//! next to the deployments.

pub mod git;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, XdgpakError};
use crate::refs::{Checksum, RefId};

pub use git::GitStore;

/// Cooperative cancellation flag for long-running fetches
///
/// Cloning shares the flag, so a caller can keep one handle and pass another
/// into the store.
#[derive(Debug, Clone, Default)]
pub struct Cancellable(Arc<AtomicBool>);

impl Cancellable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(XdgpakError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How file metadata is treated when materializing a checkout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Keep only the executable bit; files are writable by the owner
    #[default]
    User,
    /// Shared system installation; files are made read-only
    System,
}

/// Result of a store garbage collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub objects_total: usize,
    pub objects_pruned: usize,
    pub bytes_freed: u64,
}

/// Blocking operations the engine needs from a content-addressed store
///
/// Implementations must be usable as `Box<dyn ContentStore>`.
pub trait ContentStore {
    /// Resolve the checksum to deploy for `reference`
    ///
    /// With a `hint`, checks that the commit exists locally or can be fetched
    /// from `origin`. Without one, returns the local tip if present, else the
    /// tip advertised by `origin`.
    fn resolve(
        &self,
        reference: &RefId,
        origin: Option<&str>,
        hint: Option<&Checksum>,
    ) -> Result<Checksum>;

    /// Make sure `checksum` and everything it references is local
    fn ensure_fetched(
        &self,
        reference: &RefId,
        origin: Option<&str>,
        checksum: &Checksum,
        cancel: &Cancellable,
    ) -> Result<()>;

    /// Materialize `checksum` at `dest`
    ///
    /// Fails if `dest` exists. Never leaves a partially written `dest`.
    fn checkout(&self, checksum: &Checksum, dest: &Path, mode: CheckoutMode) -> Result<()>;

    /// Forget `reference` so [`ContentStore::prune`] can reclaim its objects
    ///
    /// Drops the local tip and, with an `origin`, the tip tracked for it.
    /// Missing tips are not an error.
    fn remove_ref(&self, reference: &RefId, origin: Option<&str>) -> Result<()>;

    /// Drop `origin` if the store created it on its own
    ///
    /// Returns whether it was removed. Origins added explicitly are kept.
    fn remove_origin(&self, _origin: &str) -> Result<bool> {
        Ok(false)
    }

    /// Drop objects no longer reachable from any ref
    fn prune(&self) -> Result<PruneStats>;
}
