//! Advisory file locking
//!
//! Two lock domains share this module:
//!
//! - The **installation lock** (`<base>/lock`), held exclusively for the whole
//!   critical section of install, update, uninstall and prune. It serializes
//!   structural changes across processes.
//! - The **checkout lock** (`<checkout>/files/.ref`), held shared by any
//!   long-lived consumer of a checkout, such as a running sandbox. The engine
//!   never waits on it; it only checks it to decide whether a removed checkout
//!   can be deleted yet.
//!
//! Locks are `flock`-style and released when the guard is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs4::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result, lock as errors};

/// Name of the installation lock file under the base directory
pub const INSTALLATION_LOCK_FILE: &str = "lock";

/// Shared or exclusive locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// What to do when the installation lock is held elsewhere
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPolicy {
    /// Block until the lock is released
    #[default]
    Wait,
    /// Give up immediately with `LockBusy`
    Fail,
}

/// RAII guard for an advisory lock
///
/// The lock is released when the guard is dropped. The lock file itself is
/// left in place; removing it would race with other processes opening it.
#[derive(Debug)]
pub struct ScopedLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl ScopedLock {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for ScopedLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Acquires and checks advisory locks
#[derive(Debug, Clone, Copy, Default)]
pub struct LockManager {
    policy: LockPolicy,
}

impl LockManager {
    pub fn new(policy: LockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Acquire a lock, blocking until it is available
    ///
    /// Creates the lock file (and its parent directory) if needed.
    pub fn acquire(&self, path: &Path, mode: LockMode) -> Result<ScopedLock> {
        let file = open_lock_file(path)?;
        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|e| errors::failed(path, e))?;

        Ok(ScopedLock {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }

    /// Try to acquire a lock without blocking
    ///
    /// Returns `None` when another holder has a conflicting lock.
    pub fn try_acquire(&self, path: &Path, mode: LockMode) -> Result<Option<ScopedLock>> {
        let file = open_lock_file(path)?;
        let locked = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        };

        match locked {
            Ok(()) => Ok(Some(ScopedLock {
                file,
                path: path.to_path_buf(),
                mode,
            })),
            Err(err) if is_contended(&err) => Ok(None),
            Err(err) => Err(errors::failed(path, err)),
        }
    }

    /// Take the installation lock for a base directory, honouring the policy
    pub fn lock_installation(&self, base: &Path) -> Result<ScopedLock> {
        let path = base.join(INSTALLATION_LOCK_FILE);
        match self.policy {
            LockPolicy::Wait => self.acquire(&path, LockMode::Exclusive),
            LockPolicy::Fail => self
                .try_acquire(&path, LockMode::Exclusive)?
                .ok_or_else(|| errors::busy(&path)),
        }
    }

    /// Whether anyone currently holds a lock on `path`
    ///
    /// Attempts a non-blocking exclusive lock and releases it at once. A
    /// missing file is reported as unlocked; the file is never created.
    pub fn is_locked(path: &Path) -> Result<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(errors::failed(path, err)),
        };

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                Ok(false)
            }
            Err(err) if is_contended(&err) => Ok(true),
            Err(err) => Err(errors::failed(path, err)),
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    // Checkout lock targets may sit in a read-only tree; fall back to a
    // read-only descriptor, which flock accepts for either mode.
    match OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
    {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => File::open(path).with_path(path),
        Err(err) => Err(errors::failed(path, err)),
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
}
