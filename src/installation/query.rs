//! Lock-free queries over an installation
//!
//! Pointers may be replaced by another process at any moment; a missing link
//! or directory reads as "not installed".

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use super::{InstallationDirectory, origin};
use crate::common::fs::{is_missing, read_link_opt};
use crate::error::{IoResultExt, Result};
use crate::refs::{Checksum, RefId, RefKind};

/// Everything known about one installed ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefInfo {
    #[serde(rename = "ref")]
    pub reference: RefId,
    pub active: Option<Checksum>,
    pub deployed: Vec<Checksum>,
    pub origin: Option<String>,
    pub is_current: bool,
    pub files: Option<PathBuf>,
}

impl InstallationDirectory {
    /// Every ref of `kind` with an active checkout, sorted
    pub fn list_refs(&self, kind: RefKind) -> Result<Vec<RefId>> {
        let mut refs = Vec::new();
        for name in sorted_dir_names(&self.base().join(kind.as_str()))? {
            refs.extend(self.list_refs_for_name(kind, &name)?);
        }
        Ok(refs)
    }

    /// Every installed arch and branch of one name, sorted
    pub fn list_refs_for_name(&self, kind: RefKind, name: &str) -> Result<Vec<RefId>> {
        let name_dir = self.base().join(kind.as_str()).join(name);
        let mut refs = Vec::new();

        for arch in sorted_dir_names(&name_dir)? {
            for branch in sorted_dir_names(&name_dir.join(&arch))? {
                let Ok(reference) = RefId::new(kind, name, &arch, &branch) else {
                    tracing::debug!("skipping {kind}/{name}/{arch}/{branch}: not a valid ref");
                    continue;
                };
                if self.read_active(&reference)?.is_some() {
                    refs.push(reference);
                }
            }
        }
        Ok(refs)
    }

    /// The app ref `current` points at, if any
    pub fn current_ref(&self, app_name: &str) -> Result<Option<RefId>> {
        let Some(target) = read_link_opt(&self.current_link(app_name))? else {
            return Ok(None);
        };

        let target = target.to_string_lossy();
        let parsed = target
            .split_once('/')
            .and_then(|(arch, branch)| RefId::new(RefKind::App, app_name, arch, branch).ok());
        if parsed.is_none() {
            tracing::warn!("ignoring malformed current link for {app_name}: {target}");
        }
        Ok(parsed)
    }

    pub fn is_current(&self, reference: &RefId) -> Result<bool> {
        if !reference.is_app() {
            return Ok(false);
        }
        Ok(self.current_ref(reference.name())?.as_ref() == Some(reference))
    }

    pub fn read_active(&self, reference: &RefId) -> Result<Option<Checksum>> {
        self.deployment_state(reference).read_active()
    }

    /// Checkout directory for `checksum`, or for the active one when `None`
    pub fn get_if_deployed(
        &self,
        reference: &RefId,
        checksum: Option<&Checksum>,
    ) -> Result<Option<PathBuf>> {
        let state = self.deployment_state(reference);
        let checksum = match checksum {
            Some(checksum) => checksum.clone(),
            None => match state.read_active()? {
                Some(active) => active,
                None => return Ok(None),
            },
        };
        let dir = state.checkout_dir(&checksum);
        Ok(dir.is_dir().then_some(dir))
    }

    /// Payload tree of the active checkout
    pub fn files_path(&self, reference: &RefId) -> Result<Option<PathBuf>> {
        Ok(self
            .get_if_deployed(reference, None)?
            .map(|dir| dir.join("files")))
    }

    pub fn export_path(&self, reference: &RefId) -> Result<Option<PathBuf>> {
        Ok(self
            .get_if_deployed(reference, None)?
            .map(|dir| dir.join("export"))
            .filter(|dir| dir.is_dir()))
    }

    pub fn get_origin(&self, reference: &RefId) -> Result<Option<String>> {
        origin::read_origin(self.deployment_state(reference).ref_dir())
    }

    pub fn info(&self, reference: &RefId) -> Result<RefInfo> {
        let state = self.deployment_state(reference);
        Ok(RefInfo {
            reference: reference.clone(),
            active: state.read_active()?,
            deployed: state.list_deployed()?,
            origin: origin::read_origin(state.ref_dir())?,
            is_current: self.is_current(reference)?,
            files: self.files_path(reference)?,
        })
    }
}

fn sorted_dir_names(dir: &std::path::Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if is_missing(&err) => return Ok(Vec::new()),
        Err(err) => return Err(crate::error::fs::io_error(dir, err)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_path(dir)?;
        if !entry.file_type().with_path(&entry.path())?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
