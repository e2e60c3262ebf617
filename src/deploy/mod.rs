//! Per-ref deployment state
//!
//! Each ref owns a directory `<base>/<kind>/<name>/<arch>/<branch>/` holding
//! one immutable checkout per deployed checksum, plus the `active` symlink
//! naming the checkout in effect:
//!
//! ```text
//! app/org.example.Foo/x86_64/stable/
//!     active -> 3f2a...
//!     3f2a.../files/...
//!     3f2a.../files/.ref
//!     3f2a.../export/...
//! ```
//!
//! A ref moves between three states per checksum: undeployed (no directory),
//! deployed (directory exists) and active (`active` points at it). The
//! `active` symlink is only ever replaced by rename, so readers without the
//! installation lock see either the old or the new target, or nothing.

pub mod removed;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::common::fs::{read_link_opt, remove_symlink_if_exists, remove_tree, replace_symlink};
use crate::error::{IoResultExt, Result, deploy as errors};
use crate::export::{self, ExportContext, ExportReport};
use crate::lock::LockManager;
use crate::refs::{Checksum, RefId, is_checksum};
use crate::store::{CheckoutMode, ContentStore};

pub use removed::{CleanupStats, cleanup_removed};

/// Name of the active pointer inside a ref directory
pub const ACTIVE_LINK: &str = "active";

/// Where one checksum stands within its ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployState {
    Undeployed,
    Deployed(Checksum),
    Active(Checksum),
}

/// What happened to an undeployed checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndeployOutcome {
    /// The checkout was deleted
    Deleted,
    /// The checkout is still in use and waits in the holding area
    Deferred(PathBuf),
}

/// Settings that shape a new checkout
#[derive(Debug, Clone)]
pub struct DeployContext {
    pub checkout_mode: CheckoutMode,
    /// Command written into rewritten launcher entries
    pub launcher: String,
}

impl Default for DeployContext {
    fn default() -> Self {
        Self {
            checkout_mode: CheckoutMode::User,
            launcher: "xdgpak".to_string(),
        }
    }
}

/// Deployment state machine for a single ref
#[derive(Debug, Clone)]
pub struct DeploymentState {
    reference: RefId,
    base: PathBuf,
    ref_dir: PathBuf,
}

impl DeploymentState {
    pub fn new(base: &Path, reference: &RefId) -> Self {
        Self {
            reference: reference.clone(),
            base: base.to_path_buf(),
            ref_dir: base.join(reference.path_suffix()),
        }
    }

    pub fn reference(&self) -> &RefId {
        &self.reference
    }

    pub fn ref_dir(&self) -> &Path {
        &self.ref_dir
    }

    pub fn checkout_dir(&self, checksum: &Checksum) -> PathBuf {
        self.ref_dir.join(checksum.as_str())
    }

    pub fn active_link(&self) -> PathBuf {
        self.ref_dir.join(ACTIVE_LINK)
    }

    /// Lock target that consumers hold while using a checkout
    pub fn ref_lock_path(&self, checksum: &Checksum) -> PathBuf {
        self.checkout_dir(checksum).join("files").join(".ref")
    }

    /// The active checksum, or `None` if no checkout is active
    ///
    /// A link that does not name a checksum is treated as absent.
    pub fn read_active(&self) -> Result<Option<Checksum>> {
        let Some(target) = read_link_opt(&self.active_link())? else {
            return Ok(None);
        };

        let name = target.to_string_lossy();
        match Checksum::parse(&name) {
            Ok(checksum) => Ok(Some(checksum)),
            Err(_) => {
                tracing::warn!(
                    "{} points at {name}, which is not a checksum",
                    self.active_link().display()
                );
                Ok(None)
            }
        }
    }

    /// Path of the active checkout, if any
    pub fn active_dir(&self) -> Result<Option<PathBuf>> {
        Ok(self.read_active()?.map(|c| self.checkout_dir(&c)))
    }

    /// Deployed checksums in lexicographic order
    pub fn list_deployed(&self) -> Result<Vec<Checksum>> {
        let entries = match fs::read_dir(&self.ref_dir) {
            Ok(entries) => entries,
            Err(err) if crate::common::fs::is_missing(&err) => return Ok(Vec::new()),
            Err(err) => return Err(crate::error::fs::io_error(&self.ref_dir, err)),
        };

        let mut deployed = Vec::new();
        for entry in entries {
            let entry = entry.with_path(&self.ref_dir)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_checksum(name) {
                continue;
            }
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                deployed.push(Checksum::parse(name)?);
            }
        }

        deployed.sort();
        Ok(deployed)
    }

    pub fn is_deployed(&self, checksum: &Checksum) -> bool {
        fs::symlink_metadata(self.checkout_dir(checksum)).is_ok_and(|m| m.is_dir())
    }

    pub fn state_of(&self, checksum: &Checksum) -> Result<DeployState> {
        if !self.is_deployed(checksum) {
            return Ok(DeployState::Undeployed);
        }
        if self.read_active()?.as_ref() == Some(checksum) {
            Ok(DeployState::Active(checksum.clone()))
        } else {
            Ok(DeployState::Deployed(checksum.clone()))
        }
    }

    /// Check out `checksum` and make it active
    ///
    /// On any failure after the checkout directory appeared, the directory is
    /// removed again before the error is returned.
    pub fn deploy(
        &self,
        store: &dyn ContentStore,
        checksum: &Checksum,
        is_update: bool,
        ctx: &DeployContext,
    ) -> Result<ExportReport> {
        let dest = self.checkout_dir(checksum);
        if fs::symlink_metadata(&dest).is_ok() {
            return Err(errors::already_deployed(&self.reference, checksum));
        }
        if is_update && self.read_active()?.is_none() {
            return Err(errors::not_installed(&self.reference));
        }

        fs::create_dir_all(&self.ref_dir).with_path(&self.ref_dir)?;
        store.checkout(checksum, &dest, ctx.checkout_mode)?;

        match self.finish_deploy(checksum, &dest, ctx) {
            Ok(report) => {
                tracing::info!("deployed {} at {}", self.reference, checksum.short());
                Ok(report)
            }
            Err(err) => {
                if let Err(cleanup) = remove_tree(&dest) {
                    tracing::warn!("failed to roll back {}: {cleanup}", dest.display());
                }
                Err(err)
            }
        }
    }

    fn finish_deploy(
        &self,
        checksum: &Checksum,
        dest: &Path,
        ctx: &DeployContext,
    ) -> Result<ExportReport> {
        let files = dest.join("files");
        fs::create_dir_all(&files).with_path(&files)?;
        let ref_lock = files.join(".ref");
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&ref_lock)
            .with_path(&ref_lock)?;

        let mut report = ExportReport::default();
        if self.reference.is_app() {
            let export_ctx = ExportContext::for_ref(&self.reference, &ctx.launcher);
            let collected = export::collect_exports(dest, self.reference.name())?;
            report = export::rewrite_export_dir(dest, &export_ctx)?;
            report.rejected.extend(collected.rejected);
        }

        self.set_active(Some(checksum))?;
        Ok(report)
    }

    /// Point `active` at `checksum`, or remove it for `None`
    pub fn set_active(&self, checksum: Option<&Checksum>) -> Result<()> {
        match checksum {
            Some(checksum) => {
                replace_symlink(&self.active_link(), Path::new(checksum.as_str()))?;
                tracing::debug!("{} active -> {}", self.reference, checksum.short());
            }
            None => {
                if remove_symlink_if_exists(&self.active_link())? {
                    tracing::debug!("{} has no active checkout", self.reference);
                }
            }
        }
        Ok(())
    }

    /// Remove the checkout for `checksum`
    ///
    /// If it was active, `active` moves to the smallest remaining checksum or
    /// is removed. The checkout is quarantined first; it is deleted right away
    /// when `force` is set or no consumer holds its lock.
    pub fn undeploy(&self, checksum: &Checksum, force: bool) -> Result<UndeployOutcome> {
        let dir = self.checkout_dir(checksum);
        if !self.is_deployed(checksum) {
            return Err(errors::already_undeployed(&self.reference, checksum));
        }

        if self.read_active()?.as_ref() == Some(checksum) {
            let next = self
                .list_deployed()?
                .into_iter()
                .find(|other| other != checksum);
            self.set_active(next.as_ref())?;
        }

        let quarantined = removed::quarantine(&self.base, &dir, checksum)?;

        if !force && removed::is_in_use(&quarantined)? {
            tracing::info!(
                "{} {} is in use, deferring deletion",
                self.reference,
                checksum.short()
            );
            return Ok(UndeployOutcome::Deferred(quarantined));
        }

        match remove_tree(&quarantined) {
            Ok(()) => {
                tracing::info!("undeployed {} {}", self.reference, checksum.short());
                Ok(UndeployOutcome::Deleted)
            }
            Err(err) => {
                tracing::warn!("failed to delete {}: {err}", quarantined.display());
                Ok(UndeployOutcome::Deferred(quarantined))
            }
        }
    }

    /// Whether any consumer currently holds the lock on a checkout
    pub fn is_in_use(&self, checksum: &Checksum) -> Result<bool> {
        LockManager::is_locked(&self.ref_lock_path(checksum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XdgpakError;
    use crate::store::{Cancellable, PruneStats};
    use std::cell::Cell;
    use tempfile::TempDir;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const C: &str = "cccccccccccccccccccccccccccccccccccccccc";

    /// Store that materializes a tiny app tree for any checksum
    #[derive(Default)]
    struct DirStore {
        checkouts: Cell<usize>,
    }

    impl ContentStore for DirStore {
        fn resolve(&self, _: &RefId, _: Option<&str>, hint: Option<&Checksum>) -> Result<Checksum> {
            Ok(hint.cloned().unwrap_or_else(|| sum(A)))
        }

        fn ensure_fetched(
            &self,
            _: &RefId,
            _: Option<&str>,
            _: &Checksum,
            _: &Cancellable,
        ) -> Result<()> {
            Ok(())
        }

        fn checkout(&self, checksum: &Checksum, dest: &Path, _: CheckoutMode) -> Result<()> {
            self.checkouts.set(self.checkouts.get() + 1);
            let apps = dest.join("files/share/applications");
            fs::create_dir_all(&apps).unwrap();
            fs::write(
                apps.join("org.example.Foo.desktop"),
                format!("[Desktop Entry]\nName=Foo {checksum}\nExec=foo %U\n"),
            )
            .unwrap();
            Ok(())
        }

        fn remove_ref(&self, _: &RefId, _: Option<&str>) -> Result<()> {
            Ok(())
        }

        fn prune(&self) -> Result<PruneStats> {
            Ok(PruneStats::default())
        }
    }

    fn sum(s: &str) -> Checksum {
        Checksum::parse(s).unwrap()
    }

    fn state(temp: &TempDir) -> DeploymentState {
        let reference = RefId::parse("app/org.example.Foo/x86_64/stable").unwrap();
        DeploymentState::new(temp.path(), &reference)
    }

    #[test]
    fn test_deploy_makes_active() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        let store = DirStore::default();

        let report = state
            .deploy(&store, &sum(A), false, &DeployContext::default())
            .unwrap();

        assert_eq!(state.read_active().unwrap(), Some(sum(A)));
        assert_eq!(state.state_of(&sum(A)).unwrap(), DeployState::Active(sum(A)));
        assert!(state.ref_lock_path(&sum(A)).is_file());
        assert_eq!(report.exported.len(), 1);
        assert!(
            state
                .checkout_dir(&sum(A))
                .join("export/share/applications/org.example.Foo.desktop")
                .is_file()
        );
    }

    #[test]
    fn test_deploy_twice_is_already_deployed() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        let store = DirStore::default();
        let ctx = DeployContext::default();

        state.deploy(&store, &sum(A), false, &ctx).unwrap();
        let err = state.deploy(&store, &sum(A), false, &ctx).unwrap_err();

        assert!(matches!(err, XdgpakError::AlreadyDeployed { .. }));
        assert_eq!(store.checkouts.get(), 1);
    }

    #[test]
    fn test_update_requires_active() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);

        let err = state
            .deploy(&DirStore::default(), &sum(A), true, &DeployContext::default())
            .unwrap_err();
        assert!(matches!(err, XdgpakError::NotInstalled { .. }));
        assert!(state.list_deployed().unwrap().is_empty());
    }

    #[test]
    fn test_failed_activation_leaves_no_checkout() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);

        // A directory in place of the active link makes the final rename fail
        fs::create_dir_all(state.active_link().join("blocker")).unwrap();

        let result = state.deploy(&DirStore::default(), &sum(A), false, &DeployContext::default());
        assert!(result.is_err());
        assert!(!state.checkout_dir(&sum(A)).exists());
        assert!(state.list_deployed().unwrap().is_empty());
    }

    #[test]
    fn test_list_deployed_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        let store = DirStore::default();
        let ctx = DeployContext::default();

        state.deploy(&store, &sum(C), false, &ctx).unwrap();
        state.deploy(&store, &sum(A), true, &ctx).unwrap();
        fs::create_dir_all(state.ref_dir().join("not-a-checksum")).unwrap();
        fs::write(state.ref_dir().join("origin"), "flathub\n").unwrap();

        assert_eq!(state.list_deployed().unwrap(), vec![sum(A), sum(C)]);
    }

    #[test]
    fn test_undeploy_active_repoints_to_smallest() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        let store = DirStore::default();
        let ctx = DeployContext::default();

        state.deploy(&store, &sum(C), false, &ctx).unwrap();
        state.deploy(&store, &sum(B), true, &ctx).unwrap();
        state.deploy(&store, &sum(A), true, &ctx).unwrap();
        state.set_active(Some(&sum(B))).unwrap();

        let outcome = state.undeploy(&sum(B), false).unwrap();
        assert_eq!(outcome, UndeployOutcome::Deleted);
        assert_eq!(state.read_active().unwrap(), Some(sum(A)));

        state.undeploy(&sum(A), false).unwrap();
        assert_eq!(state.read_active().unwrap(), Some(sum(C)));

        state.undeploy(&sum(C), false).unwrap();
        assert_eq!(state.read_active().unwrap(), None);
        assert!(fs::symlink_metadata(state.active_link()).is_err());
    }

    #[test]
    fn test_undeploy_missing_is_already_undeployed() {
        let temp = TempDir::new().unwrap();
        let err = state(&temp).undeploy(&sum(A), false).unwrap_err();
        assert!(matches!(err, XdgpakError::AlreadyUndeployed { .. }));
    }

    #[test]
    fn test_undeploy_defers_locked_checkout() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        state
            .deploy(&DirStore::default(), &sum(A), false, &DeployContext::default())
            .unwrap();

        let guard = LockManager::default()
            .acquire(&state.ref_lock_path(&sum(A)), crate::lock::LockMode::Shared)
            .unwrap();
        assert!(state.is_in_use(&sum(A)).unwrap());

        let outcome = state.undeploy(&sum(A), false).unwrap();
        let UndeployOutcome::Deferred(held) = outcome else {
            panic!("expected deferred deletion");
        };
        assert!(held.exists());
        assert!(!state.is_deployed(&sum(A)));

        drop(guard);
        let stats = cleanup_removed(temp.path()).unwrap();
        assert_eq!(stats.removed, 1);
        assert!(!held.exists());
    }

    #[test]
    fn test_forced_undeploy_ignores_lock() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        state
            .deploy(&DirStore::default(), &sum(A), false, &DeployContext::default())
            .unwrap();

        let _guard = LockManager::default()
            .acquire(&state.ref_lock_path(&sum(A)), crate::lock::LockMode::Shared)
            .unwrap();

        assert_eq!(state.undeploy(&sum(A), true).unwrap(), UndeployOutcome::Deleted);
    }

    #[test]
    fn test_read_active_ignores_garbage_target() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        fs::create_dir_all(state.ref_dir()).unwrap();
        std::os::unix::fs::symlink("not-a-checksum", state.active_link()).unwrap();

        assert_eq!(state.read_active().unwrap(), None);
    }
}
