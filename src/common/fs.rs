//! File system primitives shared by deployment and export code
//!
//! Pointers in an installation (`active`, `current`, export links) are plain
//! symlinks. They are only ever replaced through [`replace_symlink`], which
//! writes a temporary link next to the target and renames it into place, so
//! a concurrent reader sees either the old or the new target.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::{IoResultExt, Result};

/// Random alphanumeric string, used for temporary and quarantine names
pub fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Atomically point `link` at `target`
///
/// Creates `.<name>-XXXXXX` in the same directory and renames it over
/// `link`. On failure the temporary link is removed and `link` is untouched.
pub fn replace_symlink(link: &Path, target: &Path) -> Result<()> {
    let parent = link.parent().unwrap_or_else(|| Path::new("."));
    let name = link
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let tmp = parent.join(format!(".{name}-{}", random_suffix(6)));
    symlink(target, &tmp).with_path(&tmp)?;

    if let Err(err) = fs::rename(&tmp, link) {
        let _ = fs::remove_file(&tmp);
        return Err(crate::error::fs::io_error(link, err));
    }

    Ok(())
}

/// Read a symlink, treating a missing path as `None`
///
/// Readers run without the installation lock, so pointers may vanish under
/// them. `ENOTDIR` is treated the same way as `ENOENT`.
pub fn read_link_opt(link: &Path) -> Result<Option<PathBuf>> {
    match fs::read_link(link) {
        Ok(target) => Ok(Some(target)),
        Err(err) if is_missing(&err) => Ok(None),
        Err(err) => Err(crate::error::fs::io_error(link, err)),
    }
}

/// Remove a symlink; returns whether anything was removed
pub fn remove_symlink_if_exists(link: &Path) -> Result<bool> {
    match fs::remove_file(link) {
        Ok(()) => Ok(true),
        Err(err) if is_missing(&err) => Ok(false),
        Err(err) => Err(crate::error::fs::io_error(link, err)),
    }
}

/// Remove a directory only if it is empty; returns whether it was removed
pub fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    match fs::remove_dir(dir) {
        Ok(()) => Ok(true),
        Err(err) if is_missing(&err) || is_not_empty(&err) => Ok(false),
        Err(err) => Err(crate::error::fs::io_error(dir, err)),
    }
}

/// Recursively delete a tree, making read-only directories writable first
///
/// System checkouts are materialized without write bits, which would make
/// `remove_dir_all` fail on the first nested file.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => return Ok(()),
        Err(err) if is_missing(&err) => return Ok(()),
        Err(err) if err.kind() != ErrorKind::PermissionDenied => {
            return Err(crate::error::fs::io_error(path, err));
        }
        Err(_) => {}
    }

    make_tree_writable(path)?;
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if is_missing(&err) => Ok(()),
        Err(err) => Err(crate::error::fs::io_error(path, err)),
    }
}

fn make_tree_writable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in walkdir::WalkDir::new(path).follow_links(false) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_dir() {
            continue;
        }
        let mut perms = fs::metadata(entry.path())
            .with_path(entry.path())?
            .permissions();
        perms.set_mode(perms.mode() | 0o700);
        fs::set_permissions(entry.path(), perms).with_path(entry.path())?;
    }
    Ok(())
}

pub(crate) fn is_missing(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

fn is_not_empty(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::DirectoryNotEmpty
}
