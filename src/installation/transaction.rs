//! Rollback support for structural operations
//!
//! ```ignore
//! let mut tx = Transaction::new();
//! tx.create_dir_all(&ref_dir)?;
//! tx.track_file_created(ref_dir.join("origin"));
//!
//! // ... more steps that may fail ...
//!
//! tx.commit();
//! // Dropping without commit() undoes everything tracked above
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::{remove_dir_if_empty, remove_tree};
use crate::error::{IoResultExt, Result};

/// Undo log for one install, update or uninstall
#[derive(Debug, Default)]
pub struct Transaction {
    /// Files and symlinks created during this transaction
    created_files: HashSet<PathBuf>,

    /// Directories created during this transaction
    created_dirs: HashSet<PathBuf>,

    /// Checkout directories, removed recursively on rollback
    checkouts: Vec<PathBuf>,

    committed: bool,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a file or symlink that was created during this transaction
    pub fn track_file_created(&mut self, path: impl Into<PathBuf>) {
        self.created_files.insert(path.into());
    }

    /// Track a directory that was created during this transaction
    pub fn track_dir_created(&mut self, path: impl Into<PathBuf>) {
        self.created_dirs.insert(path.into());
    }

    /// Track a checkout directory that must not outlive a failed operation
    pub fn track_checkout(&mut self, path: impl Into<PathBuf>) {
        self.checkouts.push(path.into());
    }

    /// `create_dir_all`, tracking every directory that did not exist before
    pub fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(path);
        while let Some(dir) = current {
            if fs::symlink_metadata(dir).is_ok() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }

        fs::create_dir_all(path).with_path(path)?;
        self.created_dirs.extend(missing);
        Ok(())
    }

    /// Keep everything; nothing is undone on drop
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Undo tracked changes
    ///
    /// Checkouts are deleted recursively, files are removed, then tracked
    /// directories are removed deepest first if they are empty.
    pub fn rollback(&mut self) {
        if self.committed {
            return;
        }

        for checkout in self.checkouts.drain(..) {
            if let Err(e) = remove_tree(&checkout) {
                tracing::warn!("failed to remove {}: {e}", checkout.display());
            }
        }

        for path in self.created_files.drain() {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("failed to remove {}: {e}", path.display());
                }
            }
        }

        let mut dirs: Vec<_> = self.created_dirs.drain().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            if let Err(e) = remove_dir_if_empty(&dir) {
                tracing::warn!("failed to remove {}: {e}", dir.display());
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!("rolling back uncommitted transaction");
            self.rollback();
        }
    }
}
