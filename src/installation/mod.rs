//! Installation directory
//!
//! [`InstallationDirectory`] ties a base directory, a content store and the
//! lock protocol together. Structural operations (install, update,
//! uninstall, make-current, prune) hold the exclusive installation lock for
//! their whole critical section. Queries in [`query`] take no lock and
//! tolerate pointers changing under them.
//!
//! Layout under the base directory:
//!
//! ```text
//! lock
//! repo/                                   content store (git)
//! <kind>/<name>/<arch>/<branch>/          per-ref state, see crate::deploy
//! app/<name>/current -> <arch>/<branch>
//! .removed/<random>-<checksum>/
//! exports/                                symlink farm
//! ```

pub mod origin;
pub mod query;
pub mod transaction;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::common::fs::{read_link_opt, remove_dir_if_empty, remove_symlink_if_exists, replace_symlink};
use crate::config::Config;
use crate::deploy::{self, CleanupStats, DeployContext, DeploymentState, UndeployOutcome};
use crate::error::{IoResultExt, Result, deploy as errors, refs as ref_errors};
use crate::export::{EXPORTS_DIR, ExportOverlay, ExportReport, RefreshReport};
use crate::lock::{LockManager, LockPolicy};
use crate::refs::{Checksum, RefId, RefKind};
use crate::store::{Cancellable, CheckoutMode, ContentStore, GitStore, PruneStats};
use crate::triggers::TriggerRunner;

pub use query::RefInfo;
pub use transaction::Transaction;

/// Name of the content store directory under the base
pub const REPO_DIR: &str = "repo";

/// Name of the per-app default branch pointer
pub const CURRENT_LINK: &str = "current";

/// Behaviour knobs for one installation
#[derive(Debug, Clone)]
pub struct InstallationOptions {
    /// Per-user installation rather than system-wide
    pub user: bool,
    pub launcher: String,
    pub triggers_dir: Option<PathBuf>,
    pub lock_policy: LockPolicy,
    pub checkout_mode: CheckoutMode,
    /// Prune the content store after update and uninstall
    pub auto_prune: bool,
}

impl Default for InstallationOptions {
    fn default() -> Self {
        Self {
            user: true,
            launcher: crate::config::DEFAULT_LAUNCHER.to_string(),
            triggers_dir: None,
            lock_policy: LockPolicy::Wait,
            checkout_mode: CheckoutMode::User,
            auto_prune: true,
        }
    }
}

impl InstallationOptions {
    pub fn from_config(config: &Config, user: bool) -> Self {
        Self {
            user,
            launcher: config.launcher.clone(),
            triggers_dir: config.triggers_dir.clone(),
            lock_policy: config.lock_policy,
            checkout_mode: if user {
                CheckoutMode::User
            } else {
                CheckoutMode::System
            },
            auto_prune: config.auto_prune,
        }
    }
}

/// Result of [`InstallationDirectory::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The active checkout already is the resolved commit
    NoChange(Checksum),
    Updated {
        from: Checksum,
        to: Checksum,
        /// What happened to the previously active checkout
        previous: UndeployOutcome,
    },
}

/// Result of [`InstallationDirectory::uninstall`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UninstallOutcome {
    pub deleted: Vec<Checksum>,
    /// Checkouts still in use, left in the holding area
    pub deferred: Vec<Checksum>,
}

/// One installation base directory and its content store
pub struct InstallationDirectory {
    base: PathBuf,
    store: Box<dyn ContentStore>,
    locks: LockManager,
    overlay: ExportOverlay,
    options: InstallationOptions,
    cancel: Cancellable,
}

impl std::fmt::Debug for InstallationDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationDirectory")
            .field("base", &self.base)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl InstallationDirectory {
    pub fn open(base: &Path, store: Box<dyn ContentStore>, options: InstallationOptions) -> Self {
        let triggers = TriggerRunner::new(options.triggers_dir.clone());
        Self {
            base: base.to_path_buf(),
            store,
            locks: LockManager::new(options.lock_policy),
            overlay: ExportOverlay::new(base, triggers),
            options,
            cancel: Cancellable::new(),
        }
    }

    /// The per-user installation with a git content store
    pub fn open_user(config: &Config) -> Result<Self> {
        Self::open_scope(config, true)
    }

    /// The system-wide installation with a git content store
    pub fn open_system(config: &Config) -> Result<Self> {
        Self::open_scope(config, false)
    }

    fn open_scope(config: &Config, user: bool) -> Result<Self> {
        let base = config.installation_dir(user);
        let store = GitStore::open_or_init(&base.join(REPO_DIR))?;
        Ok(Self::open(
            base,
            Box::new(store),
            InstallationOptions::from_config(config, user),
        ))
    }

    /// Share a cancellation flag with the caller
    #[must_use]
    pub fn with_cancellable(mut self, cancel: Cancellable) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn is_user(&self) -> bool {
        self.options.user
    }

    pub fn options(&self) -> &InstallationOptions {
        &self.options
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    pub fn cancellable(&self) -> &Cancellable {
        &self.cancel
    }

    /// Create the base directory and its fixed subdirectories
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [
            self.base.clone(),
            deploy::removed::removed_dir(&self.base),
            self.base.join(EXPORTS_DIR),
        ] {
            fs::create_dir_all(&dir).with_path(&dir)?;
        }
        Ok(())
    }

    pub fn deployment_state(&self, reference: &RefId) -> DeploymentState {
        DeploymentState::new(&self.base, reference)
    }

    fn deploy_context(&self) -> DeployContext {
        DeployContext {
            checkout_mode: self.options.checkout_mode,
            launcher: self.options.launcher.clone(),
        }
    }

    pub(crate) fn current_link(&self, app_name: &str) -> PathBuf {
        self.base.join("app").join(app_name).join(CURRENT_LINK)
    }

    /// Install `reference` and make it active
    ///
    /// Fails with `AlreadyDeployed` if any checkout of the ref exists. For
    /// apps, the ref also becomes `current` unless another branch already is.
    pub fn install(
        &self,
        reference: &RefId,
        origin: Option<&str>,
        hint: Option<&Checksum>,
    ) -> Result<Checksum> {
        self.ensure_layout()?;
        let _lock = self.locks.lock_installation(&self.base)?;
        let state = self.deployment_state(reference);

        if let Some(existing) = state.list_deployed()?.first() {
            return Err(errors::already_deployed(reference, existing));
        }

        let checksum = self.store.resolve(reference, origin, hint)?;
        self.store
            .ensure_fetched(reference, origin, &checksum, &self.cancel)?;

        let mut tx = Transaction::new();
        tx.create_dir_all(state.ref_dir())?;

        let report = state.deploy(self.store.as_ref(), &checksum, false, &self.deploy_context())?;
        tx.track_checkout(state.checkout_dir(&checksum));
        tx.track_file_created(state.active_link());

        if let Some(origin) = origin {
            origin::write_origin(state.ref_dir(), origin)?;
            tx.track_file_created(origin::origin_path(state.ref_dir()));
        }

        if reference.is_app() {
            let link = self.current_link(reference.name());
            if read_link_opt(&link)?.is_none() {
                replace_symlink(&link, &current_target(reference))?;
                tx.track_file_created(link);
            }
        }

        tx.commit();
        log_rejections(&report);
        tracing::info!("installed {reference} at {}", checksum.short());

        if reference.is_app() {
            self.refresh_exports(reference.name());
        }
        Ok(checksum)
    }

    /// Move `reference` to `checksum`, or to the tip of its origin
    ///
    /// The previously active checkout is undeployed without forcing, so a
    /// running instance keeps its files until it exits.
    pub fn update(&self, reference: &RefId, checksum: Option<&Checksum>) -> Result<UpdateOutcome> {
        let _lock = self.locks.lock_installation(&self.base)?;
        let state = self.deployment_state(reference);

        let Some(previous) = state.read_active()? else {
            return Err(errors::not_installed(reference));
        };
        let origin = origin::read_origin(state.ref_dir())?;

        let target = self.store.resolve(reference, origin.as_deref(), checksum)?;
        if target == previous {
            tracing::info!("{reference} is already at {}", target.short());
            return Ok(UpdateOutcome::NoChange(previous));
        }
        self.store
            .ensure_fetched(reference, origin.as_deref(), &target, &self.cancel)?;

        if state.is_deployed(&target) {
            state.set_active(Some(&target))?;
        } else {
            let report =
                state.deploy(self.store.as_ref(), &target, true, &self.deploy_context())?;
            log_rejections(&report);
        }

        let undeployed = state.undeploy(&previous, false)?;
        tracing::info!(
            "updated {reference} from {} to {}",
            previous.short(),
            target.short()
        );

        if self.options.auto_prune {
            self.prune_quietly();
        }
        if reference.is_app() && self.is_current(reference)? {
            self.refresh_exports(reference.name());
        }

        Ok(UpdateOutcome::Updated {
            from: previous,
            to: target,
            previous: undeployed,
        })
    }

    /// Remove every checkout of `reference`
    ///
    /// With `force`, checkouts are deleted even while a consumer holds them.
    pub fn uninstall(&self, reference: &RefId, force: bool) -> Result<UninstallOutcome> {
        let _lock = self.locks.lock_installation(&self.base)?;
        let state = self.deployment_state(reference);

        let deployed = state.list_deployed()?;
        if deployed.is_empty() {
            return Err(errors::not_installed(reference));
        }

        state.set_active(None)?;
        if reference.is_app() && self.is_current(reference)? {
            remove_symlink_if_exists(&self.current_link(reference.name()))?;
        }

        let mut outcome = UninstallOutcome::default();
        for checksum in deployed {
            match state.undeploy(&checksum, force)? {
                UndeployOutcome::Deleted => outcome.deleted.push(checksum),
                UndeployOutcome::Deferred(_) => outcome.deferred.push(checksum),
            }
        }

        let recorded = origin::read_origin(state.ref_dir())?;
        origin::remove_origin(state.ref_dir())?;
        let mut dir = Some(state.ref_dir());
        for _ in 0..3 {
            let Some(current) = dir else { break };
            if !remove_dir_if_empty(current)? {
                break;
            }
            dir = current.parent();
        }
        tracing::info!("uninstalled {reference}");
        self.forget_in_store(reference, recorded.as_deref());

        if reference.is_app() {
            self.refresh_exports(reference.name());
        }
        if self.options.auto_prune {
            self.prune_quietly();
        }
        Ok(outcome)
    }

    /// Make `reference` the default branch of its app
    pub fn make_current(&self, reference: &RefId) -> Result<()> {
        if !reference.is_app() {
            return Err(ref_errors::invalid_ref(
                reference.to_string(),
                "only applications have a current branch",
            ));
        }
        let _lock = self.locks.lock_installation(&self.base)?;

        if self.deployment_state(reference).read_active()?.is_none() {
            return Err(errors::not_installed(reference));
        }
        replace_symlink(
            &self.current_link(reference.name()),
            &current_target(reference),
        )?;
        tracing::info!("{reference} is now current");

        self.refresh_exports(reference.name());
        Ok(())
    }

    /// Garbage collect the content store
    pub fn prune(&self) -> Result<PruneStats> {
        let _lock = self.locks.lock_installation(&self.base)?;
        self.store.prune()
    }

    /// Delete quarantined checkouts that are no longer in use
    pub fn cleanup_removed(&self) -> Result<CleanupStats> {
        let _lock = self.locks.lock_installation(&self.base)?;
        deploy::cleanup_removed(&self.base)
    }

    /// Rebuild the export overlay for every app with a current branch
    pub fn update_exports(&self) -> Result<RefreshReport> {
        let _lock = self.locks.lock_installation(&self.base)?;
        Ok(self.overlay.update_all())
    }

    fn refresh_exports(&self, app_name: &str) {
        let report = self.overlay.refresh(app_name);
        for err in &report.errors {
            tracing::warn!("export refresh for {app_name}: {err}");
        }
        tracing::debug!(
            "exports for {app_name}: {} linked, {} stale removed, {} triggers",
            report.linked,
            report.removed,
            report.triggers.ran.len()
        );
    }

    // Runs with the installation lock already held
    /// Drop the store's tips for an uninstalled ref, and its origin once unused
    fn forget_in_store(&self, reference: &RefId, origin: Option<&str>) {
        if let Err(err) = self.store.remove_ref(reference, origin) {
            tracing::warn!("failed to drop {reference} from the content store: {err}");
        }
        let Some(origin) = origin else { return };
        match self.origin_in_use(origin) {
            Ok(true) => {}
            Ok(false) => match self.store.remove_origin(origin) {
                Ok(true) => tracing::info!("removed origin {origin}"),
                Ok(false) => {}
                Err(err) => tracing::warn!("failed to remove origin {origin}: {err}"),
            },
            Err(err) => tracing::warn!("failed to check users of origin {origin}: {err}"),
        }
    }

    fn origin_in_use(&self, origin: &str) -> Result<bool> {
        for kind in [RefKind::App, RefKind::Runtime] {
            for reference in self.list_refs(kind)? {
                if self.get_origin(&reference)?.as_deref() == Some(origin) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn prune_quietly(&self) {
        if let Err(err) = self.store.prune() {
            tracing::warn!("content store prune failed: {err}");
        }
    }
}

fn current_target(reference: &RefId) -> PathBuf {
    Path::new(reference.arch()).join(reference.branch())
}

fn log_rejections(report: &ExportReport) {
    for err in &report.rejected {
        tracing::warn!("{err}");
    }
}
