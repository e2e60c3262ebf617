//! Quarantine area for undeployed checkouts
//!
//! Undeploy renames a checkout to `<base>/.removed/<random>-<checksum>`
//! before deleting it. If a consumer still holds the checkout's `files/.ref`
//! lock the directory stays there until a later [`cleanup_removed`] pass.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::{random_suffix, remove_tree};
use crate::error::{IoResultExt, Result};
use crate::lock::LockManager;
use crate::refs::Checksum;

pub const REMOVED_DIR: &str = ".removed";

/// Outcome of a holding-area garbage collection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub removed: usize,
    pub deferred: usize,
}

pub fn removed_dir(base: &Path) -> PathBuf {
    base.join(REMOVED_DIR)
}

/// Move a checkout into the holding area, returning its new location
pub fn quarantine(base: &Path, checkout: &Path, checksum: &Checksum) -> Result<PathBuf> {
    let holding = removed_dir(base);
    fs::create_dir_all(&holding).with_path(&holding)?;

    let target = holding.join(format!("{}-{}", random_suffix(6), checksum));
    fs::rename(checkout, &target).with_path(checkout)?;
    Ok(target)
}

/// Whether a quarantined checkout is still in use by some process
pub fn is_in_use(quarantined: &Path) -> Result<bool> {
    LockManager::is_locked(&quarantined.join("files").join(".ref"))
}

/// Delete every quarantined checkout that is no longer locked
pub fn cleanup_removed(base: &Path) -> Result<CleanupStats> {
    let holding = removed_dir(base);
    let mut stats = CleanupStats::default();

    let entries = match fs::read_dir(&holding) {
        Ok(entries) => entries,
        Err(err) if crate::common::fs::is_missing(&err) => return Ok(stats),
        Err(err) => return Err(crate::error::fs::io_error(&holding, err)),
    };

    for entry in entries {
        let path = entry.with_path(&holding)?.path();

        if is_in_use(&path)? {
            tracing::debug!("{} is still in use", path.display());
            stats.deferred += 1;
            continue;
        }

        match remove_tree(&path) {
            Ok(()) => stats.removed += 1,
            Err(err) => {
                tracing::warn!("failed to delete {}: {err}", path.display());
                stats.deferred += 1;
            }
        }
    }

    Ok(stats)
}
