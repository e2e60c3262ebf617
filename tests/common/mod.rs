//! Common test utilities for xdgpak integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;
use xdgpak::error::XdgpakError;
use xdgpak::store::{Cancellable, CheckoutMode, ContentStore, PruneStats};
use xdgpak::{Checksum, InstallationDirectory, InstallationOptions, RefId, Result};

pub const APP_ID: &str = "org.example.Foo";

/// Where a [`MockStore`] call should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Resolve,
    Fetch,
    Checkout,
}

/// State shared between a test and the store owned by the installation
#[derive(Default)]
pub struct MockState {
    pub tip: RefCell<Option<Checksum>>,
    pub trees: RefCell<HashMap<Checksum, Vec<(String, String)>>>,
    pub fail: Cell<Option<FailPoint>>,
    pub checkouts: Cell<usize>,
    pub prunes: Cell<usize>,
    pub forgotten: RefCell<Vec<RefId>>,
}

impl MockState {
    pub fn set_tip(&self, checksum: &Checksum) {
        *self.tip.borrow_mut() = Some(checksum.clone());
    }

    /// Replace the files materialized for `checksum`
    pub fn set_tree(&self, checksum: &Checksum, files: &[(&str, &str)]) {
        let files = files
            .iter()
            .map(|(path, content)| ((*path).to_string(), (*content).to_string()))
            .collect();
        self.trees.borrow_mut().insert(checksum.clone(), files);
    }

    pub fn fail_at(&self, point: FailPoint) {
        self.fail.set(Some(point));
    }

    pub fn clear_failure(&self) {
        self.fail.set(None);
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.fail.get() == Some(point) {
            return Err(XdgpakError::StoreError {
                message: format!("injected {point:?} failure"),
            });
        }
        Ok(())
    }
}

/// In-memory content store writing small app trees on checkout
pub struct MockStore {
    state: Rc<MockState>,
}

impl ContentStore for MockStore {
    fn resolve(
        &self,
        reference: &RefId,
        _origin: Option<&str>,
        hint: Option<&Checksum>,
    ) -> Result<Checksum> {
        self.state.check(FailPoint::Resolve)?;
        if let Some(hint) = hint {
            return Ok(hint.clone());
        }
        self.state
            .tip
            .borrow()
            .clone()
            .ok_or_else(|| XdgpakError::StoreError {
                message: format!("no tip for {reference}"),
            })
    }

    fn ensure_fetched(
        &self,
        _reference: &RefId,
        _origin: Option<&str>,
        _checksum: &Checksum,
        cancel: &Cancellable,
    ) -> Result<()> {
        cancel.check()?;
        self.state.check(FailPoint::Fetch)
    }

    fn checkout(&self, checksum: &Checksum, dest: &Path, _mode: CheckoutMode) -> Result<()> {
        self.state.check(FailPoint::Checkout)?;
        assert!(!dest.exists(), "checkout into existing {}", dest.display());
        self.state.checkouts.set(self.state.checkouts.get() + 1);

        let files = self
            .state
            .trees
            .borrow()
            .get(checksum)
            .cloned()
            .unwrap_or_else(|| default_tree(checksum));
        fs::create_dir_all(dest.join("files")).unwrap();
        for (path, content) in files {
            let path = dest.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
        }
        Ok(())
    }

    fn remove_ref(&self, reference: &RefId, _origin: Option<&str>) -> Result<()> {
        self.state.forgotten.borrow_mut().push(reference.clone());
        Ok(())
    }

    fn prune(&self) -> Result<PruneStats> {
        self.state.prunes.set(self.state.prunes.get() + 1);
        Ok(PruneStats::default())
    }
}

/// Files every mock checkout gets unless a test sets its own tree
pub fn default_tree(checksum: &Checksum) -> Vec<(String, String)> {
    vec![
        (
            "files/bin/foo".to_string(),
            format!("#!/bin/sh\necho {checksum}\n"),
        ),
        (
            format!("files/share/applications/{APP_ID}.desktop"),
            "[Desktop Entry]\nName=Foo\nExec=foo %U\nTryExec=foo\nIcon=org.example.Foo\n"
                .to_string(),
        ),
        (
            format!("files/share/icons/hicolor/64x64/apps/{APP_ID}.png"),
            "png".to_string(),
        ),
    ]
}

/// A temporary installation backed by a [`MockStore`]
pub struct TestInstallation {
    pub temp: TempDir,
    pub state: Rc<MockState>,
    pub dir: InstallationDirectory,
}

impl TestInstallation {
    pub fn new() -> Self {
        Self::with_options(InstallationOptions::default())
    }

    pub fn with_options(options: InstallationOptions) -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let state = Rc::new(MockState::default());
        let store = MockStore {
            state: Rc::clone(&state),
        };
        let dir = InstallationDirectory::open(&temp.path().join("base"), Box::new(store), options);
        Self { temp, state, dir }
    }

    pub fn base(&self) -> PathBuf {
        self.temp.path().join("base")
    }

    pub fn exported(&self, relative: &str) -> PathBuf {
        self.base().join("exports").join(relative)
    }

    /// Checksum directories present under a ref, sorted
    pub fn checkouts(&self, reference: &RefId) -> Vec<String> {
        let dir = self.base().join(reference.path_suffix());
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Entries waiting in the removed holding area
    pub fn removed_entries(&self) -> usize {
        fs::read_dir(self.base().join(".removed"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// A 40 character checksum made of `c`
pub fn checksum(c: char) -> Checksum {
    Checksum::parse(&c.to_string().repeat(40)).unwrap()
}

pub fn app_ref(branch: &str) -> RefId {
    RefId::parse(&format!("app/{APP_ID}/x86_64/{branch}")).unwrap()
}

/// Write an executable shell script
pub fn write_script(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
