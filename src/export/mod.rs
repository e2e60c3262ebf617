//! Export overlay
//!
//! Apps publish a small, fixed set of files to the host desktop: launchers,
//! icons, D-Bus activation files and search providers. Publishing happens in
//! two stages.
//!
//! 1. At deploy time, [`collect_exports`] copies allowed files from the
//!    checkout's `files/share/` into its `export/share/`, and
//!    [`rewrite_export_dir`] rewrites them to launch through the sandbox.
//!    Only files named after the app id are accepted, so one app cannot
//!    shadow another's launcher or bus name.
//! 2. [`ExportOverlay::refresh`] links `<base>/exports/` to those files
//!    through the app's `current` and `active` pointers:
//!
//! ```text
//! exports/share/applications/org.example.Foo.desktop
//!   -> ../../../app/org.example.Foo/current/active/export/share/applications/org.example.Foo.desktop
//! ```
//!
//! Since links go through the pointers, repointing `current` or `active`
//! changes what the host sees without rebuilding the overlay. Refresh only
//! adds links for new files and sweeps links left dangling by removals.

pub mod desktop;
pub mod keyfile;
pub mod shell;

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::common::fs::{is_missing, read_link_opt, remove_dir_if_empty, replace_symlink};
use crate::error::{IoResultExt, Result, XdgpakError, export as errors};
use crate::refs::RefId;
use crate::triggers::{TriggerReport, TriggerRunner};

/// Subdirectories of `share/` that apps may export
pub const EXPORT_ALLOW_LIST: &[&str] = &[
    "applications",
    "icons/hicolor",
    "dbus-1/services",
    "gnome-shell/search-providers",
];

/// Name of the overlay directory under the installation base
pub const EXPORTS_DIR: &str = "exports";

/// Identity of the app whose files are being exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportContext {
    pub app_id: String,
    pub branch: String,
    pub arch: String,
    pub launcher: String,
}

impl ExportContext {
    pub fn for_ref(reference: &RefId, launcher: &str) -> Self {
        Self {
            app_id: reference.name().to_string(),
            branch: reference.branch().to_string(),
            arch: reference.arch().to_string(),
            launcher: launcher.to_string(),
        }
    }
}

/// Files published by a checkout, and the ones refused
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Paths relative to the checkout's `export/` directory
    pub exported: Vec<PathBuf>,
    pub rejected: Vec<XdgpakError>,
}

impl ExportReport {
    pub fn merge(&mut self, other: ExportReport) {
        self.exported.extend(other.exported);
        self.rejected.extend(other.rejected);
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Whether an exported file name belongs to `app_id`
///
/// The name must be the app id itself or start with it followed by `.` or
/// `-`, as in `org.example.Foo.desktop` or `org.example.Foo-symbolic.svg`.
pub fn has_name_prefix(file_name: &str, app_id: &str) -> bool {
    match file_name.strip_prefix(app_id) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('-'),
        None => false,
    }
}

/// Copy allowed files from `files/share/` into `export/share/`
///
/// Symlinks and special files are skipped. Files not named after the app are
/// reported as rejected and never copied.
pub fn collect_exports(checkout: &Path, app_id: &str) -> Result<ExportReport> {
    let share = checkout.join("files").join("share");
    let export_share = checkout.join("export").join("share");
    let mut report = ExportReport::default();

    for sub in EXPORT_ALLOW_LIST {
        let src_root = share.join(sub);
        if !fs::symlink_metadata(&src_root).is_ok_and(|m| m.is_dir()) {
            continue;
        }

        for entry in WalkDir::new(&src_root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from).with_path(&src_root)?;
            if !entry.file_type().is_file() {
                if !entry.file_type().is_dir() {
                    tracing::debug!("not exporting non-regular file {}", entry.path().display());
                }
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&share) else {
                continue;
            };
            let name = entry.file_name().to_string_lossy();
            if !has_name_prefix(&name, app_id) {
                let shown = Path::new("files/share").join(relative);
                tracing::warn!("not exporting {}: not named after {app_id}", shown.display());
                report.rejected.push(errors::rejected(
                    &shown,
                    format!("file name does not start with '{app_id}'"),
                ));
                continue;
            }

            let dest = export_share.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).with_path(parent)?;
            }
            // Write a fresh file; read-only source modes must not carry over
            let data = fs::read(entry.path()).with_path(entry.path())?;
            fs::write(&dest, data).with_path(&dest)?;
            report.exported.push(Path::new("share").join(relative));
        }
    }

    Ok(report)
}

/// Whether `relative`, a path under `export/`, lies in an allowed subtree
pub fn is_allowed_export(relative: &Path) -> bool {
    let share = Path::new("share");
    EXPORT_ALLOW_LIST
        .iter()
        .any(|sub| relative.starts_with(share.join(sub)))
}

/// Validate `export/` and rewrite desktop entries and D-Bus services in place
///
/// A checkout may ship its own `export/` tree, so every file is checked
/// against the allow-list and the app id prefix. Files that fail are deleted
/// and reported. The returned report lists every file left in `export/`.
pub fn rewrite_export_dir(checkout: &Path, ctx: &ExportContext) -> Result<ExportReport> {
    let export_root = checkout.join("export");
    let mut report = ExportReport::default();
    if !export_root.is_dir() {
        return Ok(report);
    }

    let applications = Path::new("share/applications");
    let services = Path::new("share/dbus-1/services");

    let files: Vec<PathBuf> = WalkDir::new(&export_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(&export_root).ok().map(Path::to_path_buf))
        .collect();

    for relative in files {
        let path = export_root.join(&relative);
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let refusal = if !is_allowed_export(&relative) {
            Some("not in an exportable directory".to_string())
        } else if !has_name_prefix(&name, &ctx.app_id) {
            Some(format!("file name does not start with '{}'", ctx.app_id))
        } else {
            None
        };
        if let Some(reason) = refusal {
            let shown = Path::new("export").join(&relative);
            tracing::warn!("not exporting {}: {reason}", shown.display());
            fs::remove_file(&path).with_path(&path)?;
            report.rejected.push(errors::rejected(&shown, reason));
            continue;
        }

        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        let extension = relative.extension().and_then(|e| e.to_str());

        let rewritten = match (extension, parent) {
            (Some("desktop"), p) if p == applications => {
                let data = fs::read(&path).with_path(&path)?;
                Some(desktop::rewrite_desktop_entry(&relative, &data, ctx))
            }
            (Some("service"), p) if p == services => {
                let data = fs::read(&path).with_path(&path)?;
                Some(desktop::rewrite_dbus_service(&relative, &data, ctx))
            }
            _ => None,
        };

        match rewritten {
            None => report.exported.push(relative),
            Some(Ok(data)) => {
                fs::write(&path, data).with_path(&path)?;
                report.exported.push(relative);
            }
            Some(Err(err)) => {
                tracing::warn!("{err}");
                fs::remove_file(&path).with_path(&path)?;
                report.rejected.push(err);
            }
        }
    }

    Ok(report)
}

/// Outcome of an overlay refresh
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub linked: usize,
    pub removed: usize,
    pub errors: Vec<XdgpakError>,
    pub triggers: TriggerReport,
}

/// Maintains `<base>/exports/`
#[derive(Debug, Clone)]
pub struct ExportOverlay {
    base: PathBuf,
    triggers: TriggerRunner,
}

impl ExportOverlay {
    pub fn new(base: &Path, triggers: TriggerRunner) -> Self {
        Self {
            base: base.to_path_buf(),
            triggers,
        }
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.base.join(EXPORTS_DIR)
    }

    /// Relink exports for one app, sweep dangling links and run triggers
    ///
    /// Never fails; problems are logged and collected in the report.
    pub fn refresh(&self, app_name: &str) -> RefreshReport {
        self.refresh_apps(&[app_name.to_string()])
    }

    /// Refresh every app that has a `current` pointer
    pub fn update_all(&self) -> RefreshReport {
        match self.apps_with_current() {
            Ok(apps) => self.refresh_apps(&apps),
            Err(err) => {
                tracing::warn!("failed to list apps: {err}");
                let mut report = self.sweep_and_trigger();
                report.errors.push(err);
                report
            }
        }
    }

    fn refresh_apps(&self, apps: &[String]) -> RefreshReport {
        let mut linked = 0;
        let mut errors = Vec::new();

        for app in apps {
            match self.link_app(app) {
                Ok(count) => linked += count,
                Err(err) => {
                    tracing::warn!("failed to export {app}: {err}");
                    errors.push(err);
                }
            }
        }

        let mut report = self.sweep_and_trigger();
        report.linked = linked;
        errors.append(&mut report.errors);
        report.errors = errors;
        report
    }

    fn sweep_and_trigger(&self) -> RefreshReport {
        let mut report = RefreshReport::default();
        match remove_dangling_symlinks(&self.exports_dir()) {
            Ok(removed) => report.removed = removed,
            Err(err) => {
                tracing::warn!("failed to clean exports: {err}");
                report.errors.push(err);
            }
        }
        report.triggers = self.triggers.run(&self.base);
        report
    }

    fn apps_with_current(&self) -> Result<Vec<String>> {
        let app_root = self.base.join("app");
        let entries = match fs::read_dir(&app_root) {
            Ok(entries) => entries,
            Err(err) if is_missing(&err) => return Ok(Vec::new()),
            Err(err) => return Err(crate::error::fs::io_error(&app_root, err)),
        };

        let mut apps = Vec::new();
        for entry in entries {
            let entry = entry.with_path(&app_root)?;
            if read_link_opt(&entry.path().join("current"))?.is_some() {
                apps.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        apps.sort();
        Ok(apps)
    }

    /// Create links for every file under the app's active `export/`
    fn link_app(&self, app_name: &str) -> Result<usize> {
        let export_root = self
            .base
            .join("app")
            .join(app_name)
            .join("current")
            .join("active")
            .join("export");
        if !export_root.is_dir() {
            tracing::debug!("{app_name} has nothing to export");
            return Ok(0);
        }

        let exports = self.exports_dir();
        let prefix = Path::new("..")
            .join("app")
            .join(app_name)
            .join("current")
            .join("active")
            .join("export");
        let mut linked = 0;

        for entry in WalkDir::new(&export_root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from).with_path(&export_root)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&export_root) else {
                continue;
            };

            let link = exports.join(relative);
            let depth = relative.components().count().saturating_sub(1);
            let mut target = PathBuf::new();
            for _ in 0..depth {
                target.push("..");
            }
            target.push(&prefix);
            target.push(relative);

            if let Some(parent) = link.parent() {
                fs::create_dir_all(parent).with_path(parent)?;
            }

            if let Ok(meta) = fs::symlink_metadata(&link) {
                if !meta.file_type().is_symlink() {
                    tracing::warn!("{} exists and is not a link; skipping", link.display());
                    continue;
                }
                if read_link_opt(&link)?.as_deref() == Some(target.as_path()) {
                    continue;
                }
            }

            replace_symlink(&link, &target)?;
            linked += 1;
        }

        tracing::debug!("linked {linked} exported files for {app_name}");
        Ok(linked)
    }
}

/// Remove links whose target is gone, then any directories left empty
///
/// Returns the number of links removed.
pub fn remove_dangling_symlinks(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(dir).follow_links(false).contents_first(true) {
        let entry = entry.map_err(std::io::Error::from).with_path(dir)?;
        let path = entry.path();

        if entry.file_type().is_symlink() {
            if fs::metadata(path).is_err() {
                fs::remove_file(path).with_path(path)?;
                removed += 1;
            }
        } else if entry.file_type().is_dir() && entry.depth() > 0 {
            remove_dir_if_empty(path)?;
        }
    }

    Ok(removed)
}
