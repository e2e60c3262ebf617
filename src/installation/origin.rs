//! Origin records
//!
//! `<ref-dir>/origin` holds the name of the remote a ref was installed from,
//! as a single line of plain text. Update reads it to know where to pull new
//! commits from.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::fs::is_missing;
use crate::error::{IoResultExt, Result};

pub const ORIGIN_FILE: &str = "origin";

pub fn origin_path(ref_dir: &Path) -> PathBuf {
    ref_dir.join(ORIGIN_FILE)
}

/// Read the recorded origin, `None` if there is none
pub fn read_origin(ref_dir: &Path) -> Result<Option<String>> {
    let path = origin_path(ref_dir);
    match fs::read_to_string(&path) {
        Ok(content) => {
            let origin = content.trim();
            Ok((!origin.is_empty()).then(|| origin.to_string()))
        }
        Err(err) if is_missing(&err) => Ok(None),
        Err(err) => Err(crate::error::fs::io_error(&path, err)),
    }
}

pub fn write_origin(ref_dir: &Path, origin: &str) -> Result<()> {
    let path = origin_path(ref_dir);
    fs::write(&path, format!("{origin}\n")).with_path(&path)
}

/// Remove the origin record; returns whether one existed
pub fn remove_origin(ref_dir: &Path) -> Result<bool> {
    let path = origin_path(ref_dir);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(err) if is_missing(&err) => Ok(false),
        Err(err) => Err(crate::error::fs::io_error(&path, err)),
    }
}
