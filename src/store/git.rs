//! Git-backed content store
//!
//! Commits live in a bare repository at `<base>/repo`. Each ref is stored as
//! a branch named after its canonical string:
//!
//! - local commits: `refs/heads/app/org.example.Foo/x86_64/stable`
//! - fetched commits: `refs/remotes/<origin>/app/org.example.Foo/x86_64/stable`
//!
//! Authentication for remotes is delegated to git's native system: SSH agent,
//! keys in `~/.ssh/`, and credential helpers.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};

use git2::{
    Cred, CredentialType, ErrorClass, FetchOptions, ObjectType, Oid, RemoteCallbacks, Repository,
    Signature, Tree,
};

use super::{Cancellable, CheckoutMode, ContentStore, PruneStats};
use crate::error::{IoResultExt, Result, XdgpakError, store as errors};
use crate::refs::{Checksum, RefId};

const MODE_BLOB: i32 = 0o100_644;
const MODE_BLOB_EXECUTABLE: i32 = 0o100_755;
const MODE_LINK: i32 = 0o120_000;
const MODE_TREE: i32 = 0o040_000;

/// Remote config key marking remotes created for installing from a URL
const AUTO_REMOTE_KEY: &str = "xdgpak-auto";

/// Callback receiving `(received_objects, total_objects)` during fetches
pub type FetchProgressFn = Box<dyn Fn(usize, usize)>;

/// Content store over a bare git repository
pub struct GitStore {
    repo: Repository,
    progress: Option<FetchProgressFn>,
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.repo.path())
            .finish_non_exhaustive()
    }
}

impl GitStore {
    /// Open the repository at `path`, creating a bare one if missing
    pub fn open_or_init(path: &Path) -> Result<Self> {
        let repo = if path.join("HEAD").exists() {
            Repository::open_bare(path)
        } else {
            fs::create_dir_all(path).with_path(path)?;
            tracing::debug!("initializing content store at {}", path.display());
            Repository::init_bare(path)
        }
        .map_err(|e| errors::operation_failed(format!("{}: {}", path.display(), e.message())))?;

        Ok(Self {
            repo,
            progress: None,
        })
    }

    /// Report fetch progress through `callback`
    pub fn with_progress(mut self, callback: FetchProgressFn) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    /// Register a remote to fetch refs from
    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        if !git2::Remote::is_valid_name(name) {
            return Err(errors::operation_failed(format!(
                "'{name}' is not a valid remote name"
            )));
        }
        let url = normalize_remote_url(url);
        let refspec = format!("+refs/heads/*:refs/remotes/{name}/*");
        self.repo.remote_with_fetch(name, &url, &refspec)?;
        tracing::info!("added remote {name} ({url})");
        Ok(())
    }

    /// Register a remote created only to install from `url`
    ///
    /// Such remotes are dropped by [`ContentStore::remove_origin`] once
    /// nothing installed from them remains. An existing remote with the same
    /// URL is reused as is.
    pub fn add_origin_remote(&self, name: &str, url: &str) -> Result<()> {
        match self.remote_url(name)? {
            Some(existing) if existing == normalize_remote_url(url) => Ok(()),
            Some(existing) => Err(errors::operation_failed(format!(
                "remote '{name}' already exists with URL {existing}"
            ))),
            None => {
                self.add_remote(name, url)?;
                self.repo
                    .config()?
                    .set_bool(&format!("remote.{name}.{AUTO_REMOTE_KEY}"), true)?;
                Ok(())
            }
        }
    }

    fn is_auto_remote(&self, name: &str) -> Result<bool> {
        match self
            .repo
            .config()?
            .get_bool(&format!("remote.{name}.{AUTO_REMOTE_KEY}"))
        {
            Ok(auto) => Ok(auto),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove_remote(&self, name: &str) -> Result<()> {
        self.repo.remote_delete(name)?;
        Ok(())
    }

    /// Configured remotes as `(name, url)` pairs, sorted by name
    pub fn list_remotes(&self) -> Result<Vec<(String, String)>> {
        let names = self.repo.remotes()?;
        let mut remotes = Vec::new();
        for name in names.iter().flatten() {
            if let Some(url) = self.remote_url(name)? {
                remotes.push((name.to_string(), url));
            }
        }
        remotes.sort();
        Ok(remotes)
    }

    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Commit the contents of `dir` as the new local tip of `reference`
    ///
    /// The previous local tip, if any, becomes the parent commit.
    pub fn commit_dir(&self, reference: &RefId, dir: &Path, subject: &str) -> Result<Checksum> {
        let tree_id = self.write_tree_from_dir(dir)?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = Signature::now("xdgpak", "xdgpak@localhost")?;

        let refname = local_refname(reference);
        let parent = self.lookup_commit(&refname);
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self.repo.commit(
            Some(&refname),
            &signature,
            &signature,
            subject,
            &tree,
            &parents,
        )?;
        tracing::debug!("committed {} as {}", reference, oid);
        oid_to_checksum(oid)
    }

    fn write_tree_from_dir(&self, dir: &Path) -> Result<Oid> {
        let mut builder = self.repo.treebuilder(None)?;

        for entry in fs::read_dir(dir).with_path(dir)? {
            let entry = entry.with_path(dir)?;
            let path = entry.path();
            let name = entry.file_name();
            let file_type = entry.file_type().with_path(&path)?;

            if file_type.is_symlink() {
                let target = fs::read_link(&path).with_path(&path)?;
                let blob = self.repo.blob(target.as_os_str().as_bytes())?;
                builder.insert(name.as_bytes(), blob, MODE_LINK)?;
            } else if file_type.is_dir() {
                let subtree = self.write_tree_from_dir(&path)?;
                builder.insert(name.as_bytes(), subtree, MODE_TREE)?;
            } else if file_type.is_file() {
                let executable =
                    entry.metadata().with_path(&path)?.permissions().mode() & 0o111 != 0;
                let blob = self.repo.blob_path(&path)?;
                let mode = if executable {
                    MODE_BLOB_EXECUTABLE
                } else {
                    MODE_BLOB
                };
                builder.insert(name.as_bytes(), blob, mode)?;
            }
        }

        Ok(builder.write()?)
    }

    fn lookup_commit(&self, refname: &str) -> Option<git2::Commit<'_>> {
        self.repo
            .find_reference(refname)
            .ok()
            .and_then(|r| r.peel_to_commit().ok())
    }

    fn has_commit(&self, checksum: &Checksum) -> bool {
        Oid::from_str(checksum.as_str())
            .and_then(|oid| self.repo.find_commit(oid))
            .is_ok()
    }

    /// Fetch the branch for `reference` from `origin`
    fn fetch(&self, origin: &str, reference: &RefId, cancel: &Cancellable) -> Result<()> {
        cancel.check()?;

        let mut remote = self.repo.find_remote(origin).map_err(|e| {
            errors::fetch_failed(
                reference,
                None,
                format!("unknown remote '{origin}': {}", e.message()),
            )
        })?;

        let mut callbacks = RemoteCallbacks::new();
        setup_auth_callbacks(&mut callbacks);
        callbacks.transfer_progress(|stats| {
            if cancel.is_cancelled() {
                return false;
            }
            if let Some(progress) = &self.progress {
                progress(stats.received_objects(), stats.total_objects());
            }
            true
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        let refspec = format!(
            "+{}:{}",
            local_refname(reference),
            remote_refname(origin, reference)
        );
        tracing::debug!("fetching {} from {}", reference, origin);

        match remote.fetch(&[&refspec], Some(&mut fetch_options), None) {
            Ok(()) => Ok(()),
            Err(_) if cancel.is_cancelled() => Err(XdgpakError::Cancelled),
            Err(e) => Err(errors::fetch_failed(
                reference,
                None,
                interpret_git_error(&e),
            )),
        }
    }

    fn reachable_objects(&self) -> Result<HashSet<Oid>> {
        let mut seen = HashSet::new();
        let mut walk = self.repo.revwalk()?;

        for reference in self.repo.references()? {
            let reference = reference?;
            if let Ok(commit) = reference.peel_to_commit() {
                walk.push(commit.id())?;
            }
        }

        for oid in walk {
            let oid = oid?;
            seen.insert(oid);
            let commit = self.repo.find_commit(oid)?;
            self.mark_tree(commit.tree_id(), &mut seen)?;
        }

        Ok(seen)
    }

    fn mark_tree(&self, oid: Oid, seen: &mut HashSet<Oid>) -> Result<()> {
        if !seen.insert(oid) {
            return Ok(());
        }
        let tree = self.repo.find_tree(oid)?;
        for entry in &tree {
            if entry.kind() == Some(ObjectType::Tree) {
                self.mark_tree(entry.id(), seen)?;
            } else {
                seen.insert(entry.id());
            }
        }
        Ok(())
    }

    /// Write the packed objects of `keep` into one new pack and drop the old packs
    ///
    /// Returns the number of bytes freed.
    fn repack(&self, keep: &HashSet<Oid>) -> Result<u64> {
        let pack_dir = self.repo.path().join("objects").join("pack");
        let old_packs = pack_files(&pack_dir)?;
        let old_size = total_size(&old_packs);

        let mut builder = self.repo.packbuilder()?;
        let mut count = 0;
        for oid in keep {
            if !self.loose_object_path(*oid).exists() {
                builder.insert_object(*oid, None)?;
                count += 1;
            }
        }

        let odb = self.repo.odb()?;
        if count > 0 {
            let mut data = Vec::new();
            builder.foreach(|chunk| {
                data.extend_from_slice(chunk);
                true
            })?;
            let mut writer = odb.packwriter()?;
            writer.write_all(&data).with_path(&pack_dir)?;
            writer.commit()?;
        }

        for path in &old_packs {
            fs::remove_file(path).with_path(path)?;
        }
        odb.refresh()?;

        let new_size = total_size(&pack_files(&pack_dir)?);
        tracing::debug!("repacked {count} objects into {new_size} bytes");
        Ok(old_size.saturating_sub(new_size))
    }

    fn loose_object_path(&self, oid: Oid) -> PathBuf {
        let hex = oid.to_string();
        self.repo
            .path()
            .join("objects")
            .join(&hex[..2])
            .join(&hex[2..])
    }

    fn write_checkout(&self, tree: &Tree<'_>, dir: &Path, mode: CheckoutMode) -> Result<()> {
        for entry in tree {
            let name = OsStr::from_bytes(entry.name_bytes());
            if name.is_empty() || name == "." || name == ".." || entry.name_bytes().contains(&b'/')
            {
                return Err(errors::operation_failed(format!(
                    "tree {} contains an invalid entry name",
                    tree.id()
                )));
            }
            let path = dir.join(name);

            match entry.kind() {
                Some(ObjectType::Tree) => {
                    fs::create_dir(&path).with_path(&path)?;
                    let subtree = self.repo.find_tree(entry.id())?;
                    self.write_checkout(&subtree, &path, mode)?;
                }
                Some(ObjectType::Blob) => {
                    let blob = self.repo.find_blob(entry.id())?;
                    if entry.filemode() == MODE_LINK {
                        symlink(OsStr::from_bytes(blob.content()), &path).with_path(&path)?;
                    } else {
                        fs::write(&path, blob.content()).with_path(&path)?;
                        let executable = entry.filemode() & 0o111 != 0;
                        let perms = match (mode, executable) {
                            (CheckoutMode::User, true) => 0o755,
                            (CheckoutMode::User, false) => 0o644,
                            (CheckoutMode::System, true) => 0o555,
                            (CheckoutMode::System, false) => 0o444,
                        };
                        fs::set_permissions(&path, fs::Permissions::from_mode(perms))
                            .with_path(&path)?;
                    }
                }
                // Submodule links carry no content
                _ => {}
            }
        }
        Ok(())
    }
}

impl ContentStore for GitStore {
    fn resolve(
        &self,
        reference: &RefId,
        origin: Option<&str>,
        hint: Option<&Checksum>,
    ) -> Result<Checksum> {
        if let Some(hint) = hint {
            if self.has_commit(hint) {
                return Ok(hint.clone());
            }
            let Some(origin) = origin else {
                return Err(errors::fetch_failed(
                    reference,
                    Some(hint),
                    "commit is not available locally and no origin is set",
                ));
            };
            self.fetch(origin, reference, &Cancellable::new())?;
            if self.has_commit(hint) {
                return Ok(hint.clone());
            }
            return Err(errors::fetch_failed(
                reference,
                Some(hint),
                format!("commit is not reachable from {origin}"),
            ));
        }

        if let Some(origin) = origin {
            match self.fetch(origin, reference, &Cancellable::new()) {
                Ok(()) => {
                    if let Some(commit) = self.lookup_commit(&remote_refname(origin, reference)) {
                        return oid_to_checksum(commit.id());
                    }
                }
                Err(err) => {
                    if self.lookup_commit(&local_refname(reference)).is_none() {
                        return Err(err);
                    }
                    tracing::warn!("{err}; falling back to local commit");
                }
            }
        }

        match self.lookup_commit(&local_refname(reference)) {
            Some(commit) => oid_to_checksum(commit.id()),
            None => Err(errors::fetch_failed(
                reference,
                None,
                "ref not found in the content store",
            )),
        }
    }

    fn ensure_fetched(
        &self,
        reference: &RefId,
        origin: Option<&str>,
        checksum: &Checksum,
        cancel: &Cancellable,
    ) -> Result<()> {
        cancel.check()?;
        if self.has_commit(checksum) {
            return Ok(());
        }

        let Some(origin) = origin else {
            return Err(errors::fetch_failed(
                reference,
                Some(checksum),
                "commit is not available locally and no origin is set",
            ));
        };
        self.fetch(origin, reference, cancel)?;

        if self.has_commit(checksum) {
            Ok(())
        } else {
            Err(errors::fetch_failed(
                reference,
                Some(checksum),
                format!("commit is not reachable from {origin}"),
            ))
        }
    }

    fn checkout(&self, checksum: &Checksum, dest: &Path, mode: CheckoutMode) -> Result<()> {
        if fs::symlink_metadata(dest).is_ok() {
            return Err(crate::error::fs::io_error(
                dest,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "checkout target exists"),
            ));
        }

        let oid = Oid::from_str(checksum.as_str())?;
        let commit = self.repo.find_commit(oid).map_err(|e| {
            errors::operation_failed(format!("commit {checksum} not found: {}", e.message()))
        })?;
        let tree = commit.tree()?;

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).with_path(parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".checkout-")
            .tempdir_in(parent)
            .with_path(parent)?;

        self.write_checkout(&tree, staging.path(), mode)?;
        fs::set_permissions(staging.path(), fs::Permissions::from_mode(0o755))
            .with_path(staging.path())?;

        let staged = staging.keep();
        if let Err(err) = fs::rename(&staged, dest) {
            let _ = crate::common::fs::remove_tree(&staged);
            return Err(crate::error::fs::io_error(dest, err));
        }

        tracing::debug!("checked out {} to {}", checksum.short(), dest.display());
        Ok(())
    }

    fn remove_ref(&self, reference: &RefId, origin: Option<&str>) -> Result<()> {
        let mut names = vec![local_refname(reference)];
        if let Some(origin) = origin {
            names.push(remote_refname(origin, reference));
        }
        for name in names {
            match self.repo.find_reference(&name) {
                Ok(mut found) => {
                    found.delete()?;
                    tracing::debug!("dropped {name}");
                }
                Err(e) if e.code() == git2::ErrorCode::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn remove_origin(&self, origin: &str) -> Result<bool> {
        if self.remote_url(origin)?.is_none() || !self.is_auto_remote(origin)? {
            return Ok(false);
        }
        self.remove_remote(origin)?;
        Ok(true)
    }

    fn prune(&self) -> Result<PruneStats> {
        let reachable = self.reachable_objects()?;

        let mut all = HashSet::new();
        self.repo.odb()?.foreach(|oid| {
            all.insert(*oid);
            true
        })?;

        let mut stats = PruneStats {
            objects_total: all.len(),
            ..PruneStats::default()
        };

        let mut packed_garbage = 0;
        for oid in all.iter().filter(|oid| !reachable.contains(*oid)) {
            let path = self.loose_object_path(*oid);
            match fs::metadata(&path) {
                Ok(meta) => {
                    fs::remove_file(&path).with_path(&path)?;
                    stats.objects_pruned += 1;
                    stats.bytes_freed += meta.len();
                }
                Err(_) => packed_garbage += 1,
            }
        }

        if packed_garbage > 0 {
            let keep: HashSet<Oid> = all.intersection(&reachable).copied().collect();
            stats.bytes_freed += self.repack(&keep)?;
            stats.objects_pruned += packed_garbage;
        }

        tracing::info!(
            "pruned {} of {} objects ({} bytes)",
            stats.objects_pruned,
            stats.objects_total,
            stats.bytes_freed
        );
        Ok(stats)
    }
}

fn local_refname(reference: &RefId) -> String {
    format!("refs/heads/{reference}")
}

fn remote_refname(origin: &str, reference: &RefId) -> String {
    format!("refs/remotes/{origin}/{reference}")
}

/// Pack and index files under `objects/pack`, leaving `.keep` markers alone
fn pack_files(pack_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(pack_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(crate::error::fs::io_error(pack_dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_path(pack_dir)?.path();
        let is_pack = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| name.starts_with("pack-"));
        let extension = path.extension().and_then(OsStr::to_str);
        if is_pack && matches!(extension, Some("pack" | "idx" | "rev" | "bitmap")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn total_size(paths: &[PathBuf]) -> u64 {
    paths
        .iter()
        .filter_map(|p| fs::metadata(p).ok())
        .map(|m| m.len())
        .sum()
}

fn oid_to_checksum(oid: Oid) -> Result<Checksum> {
    Checksum::parse(&oid.to_string())
}

/// Normalize SCP-style SSH URLs (`git@host:path`) to `ssh://git@host/path`
fn normalize_remote_url(url: &str) -> String {
    if !url.starts_with("git@") {
        return url.to_string();
    }
    match url.split_once(':') {
        Some((host, path)) => format!("ssh://{host}/{}", path.trim_start_matches('/')),
        None => url.to_string(),
    }
}

/// Interpret a git2 error and provide a more user-friendly message
fn interpret_git_error(err: &git2::Error) -> String {
    let message = err.message().to_lowercase();

    if message.contains("not found") || message.contains("404") {
        "Repository or ref not found".to_string()
    } else if message.contains("authentication") || message.contains("credentials") {
        "Authentication failed".to_string()
    } else if message.contains("permission denied") || message.contains("access denied") {
        "Permission denied".to_string()
    } else if message.contains("connection")
        || message.contains("network")
        || message.contains("timed out")
    {
        "Network error".to_string()
    } else if err.class() == ErrorClass::Http {
        format!("HTTP error: {}", err.message())
    } else if err.class() == ErrorClass::Ssh {
        format!("SSH error: {}", err.message())
    } else {
        err.message().to_string()
    }
}

/// Delegate remote authentication to git's native credential sources
fn setup_auth_callbacks(callbacks: &mut RemoteCallbacks<'_>) {
    callbacks.credentials(|url, username_from_url, allowed_types| {
        if allowed_types.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }

        if allowed_types.contains(CredentialType::SSH_KEY) {
            if let Some(username) = username_from_url {
                if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                    return Ok(cred);
                }

                let ssh_dir = dirs::home_dir().unwrap_or_default().join(".ssh");
                for key_name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let private_key = ssh_dir.join(key_name);
                    if !private_key.exists() {
                        continue;
                    }
                    let public_key = ssh_dir.join(format!("{key_name}.pub"));
                    let public_key = public_key.exists().then_some(public_key.as_path());
                    if let Ok(cred) = Cred::ssh_key(username, public_key, &private_key, None) {
                        return Ok(cred);
                    }
                }
            }
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(config) = git2::Config::open_default() {
                if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
                    return Ok(cred);
                }
            }
            return Cred::userpass_plaintext(username_from_url.unwrap_or(""), "");
        }

        Err(git2::Error::new(
            git2::ErrorCode::Auth,
            ErrorClass::Http,
            "authentication failed",
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn foo_ref() -> RefId {
        RefId::parse("app/org.example.Foo/x86_64/stable").unwrap()
    }

    fn payload(temp: &TempDir, body: &str) -> PathBuf {
        let dir = temp.path().join(format!("payload-{}", body.len()));
        fs::create_dir_all(dir.join("files/bin")).unwrap();
        fs::write(dir.join("files/bin/foo"), format!("#!/bin/sh\necho {body}\n")).unwrap();
        fs::set_permissions(dir.join("files/bin/foo"), fs::Permissions::from_mode(0o755))
            .unwrap();
        fs::write(dir.join("metadata"), "[Application]\nname=org.example.Foo\n").unwrap();
        symlink("bin/foo", dir.join("files/run")).unwrap();
        dir
    }

    #[test]
    fn test_commit_and_resolve_local() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();

        let checksum = store
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();
        assert_eq!(checksum.as_str().len(), 40);

        let resolved = store.resolve(&foo_ref(), None, None).unwrap();
        assert_eq!(resolved, checksum);

        let hinted = store.resolve(&foo_ref(), None, Some(&checksum)).unwrap();
        assert_eq!(hinted, checksum);
    }

    #[test]
    fn test_resolve_unknown_ref() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();

        let err = store.resolve(&foo_ref(), None, None).unwrap_err();
        assert!(matches!(err, XdgpakError::FetchError { .. }));
    }

    #[test]
    fn test_checkout_materializes_tree() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        let checksum = store
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();

        let dest = temp.path().join("deploy").join(checksum.as_str());
        store
            .checkout(&checksum, &dest, CheckoutMode::User)
            .unwrap();

        let script = dest.join("files/bin/foo");
        assert!(script.is_file());
        assert_eq!(
            fs::metadata(&script).unwrap().permissions().mode() & 0o777,
            0o755
        );
        assert_eq!(
            fs::read_link(dest.join("files/run")).unwrap(),
            PathBuf::from("bin/foo")
        );
        assert!(dest.join("metadata").is_file());
    }

    #[test]
    fn test_checkout_refuses_existing_dest() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        let checksum = store
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();

        let dest = temp.path().join("deploy");
        fs::create_dir_all(&dest).unwrap();
        let err = store
            .checkout(&checksum, &dest, CheckoutMode::User)
            .unwrap_err();
        assert!(matches!(err, XdgpakError::IoError { .. }));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_system_checkout_is_read_only() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        let checksum = store
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();

        let dest = temp.path().join("deploy");
        store
            .checkout(&checksum, &dest, CheckoutMode::System)
            .unwrap();
        let mode = fs::metadata(dest.join("metadata"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o444);
    }

    #[test]
    fn test_fetch_from_remote() {
        let temp = TempDir::new().unwrap();
        let upstream = GitStore::open_or_init(&temp.path().join("upstream")).unwrap();
        let checksum = upstream
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();

        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        store
            .add_remote("origin", upstream.path().to_str().unwrap())
            .unwrap();

        let resolved = store.resolve(&foo_ref(), Some("origin"), None).unwrap();
        assert_eq!(resolved, checksum);
        store
            .ensure_fetched(&foo_ref(), Some("origin"), &checksum, &Cancellable::new())
            .unwrap();
        assert!(store.has_commit(&checksum));
    }

    #[test]
    fn test_cancelled_fetch() {
        let temp = TempDir::new().unwrap();
        let upstream = GitStore::open_or_init(&temp.path().join("upstream")).unwrap();
        let checksum = upstream
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();

        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        store
            .add_remote("origin", upstream.path().to_str().unwrap())
            .unwrap();

        let cancel = Cancellable::new();
        cancel.cancel();
        let err = store
            .ensure_fetched(&foo_ref(), Some("origin"), &checksum, &cancel)
            .unwrap_err();
        assert!(matches!(err, XdgpakError::Cancelled));
    }

    #[test]
    fn test_unknown_remote_is_fetch_error() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();

        let err = store.resolve(&foo_ref(), Some("nowhere"), None).unwrap_err();
        assert!(matches!(err, XdgpakError::FetchError { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_remote_management() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();

        store.add_remote("flathub", "https://example.org/repo").unwrap();
        store.add_remote("beta", "git@example.org:beta.git").unwrap();

        let remotes = store.list_remotes().unwrap();
        assert_eq!(
            remotes,
            vec![
                ("beta".to_string(), "ssh://git@example.org/beta.git".to_string()),
                ("flathub".to_string(), "https://example.org/repo".to_string()),
            ]
        );

        store.remove_remote("beta").unwrap();
        assert_eq!(store.remote_url("beta").unwrap(), None);
        assert!(store.add_remote("bad name", "https://x").is_err());
    }

    #[test]
    fn test_prune_drops_unreachable_objects() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        let checksum = store
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();

        let orphan = store.repo.blob(b"nobody references this").unwrap();
        let stats = store.prune().unwrap();

        assert!(stats.objects_pruned >= 1);
        assert!(stats.bytes_freed > 0);
        assert!(!store.loose_object_path(orphan).exists());
        assert!(store.has_commit(&checksum));
    }

    #[test]
    fn test_remove_ref_then_prune_reclaims_fetched_objects() {
        let temp = TempDir::new().unwrap();
        let upstream = GitStore::open_or_init(&temp.path().join("upstream")).unwrap();
        let checksum = upstream
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();

        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        store
            .add_remote("origin", upstream.path().to_str().unwrap())
            .unwrap();
        store
            .ensure_fetched(&foo_ref(), Some("origin"), &checksum, &Cancellable::new())
            .unwrap();

        // Still referenced, so nothing goes
        assert_eq!(store.prune().unwrap().objects_pruned, 0);
        assert!(store.has_commit(&checksum));

        store.remove_ref(&foo_ref(), Some("origin")).unwrap();
        store.remove_ref(&foo_ref(), Some("origin")).unwrap();
        let stats = store.prune().unwrap();

        assert!(stats.objects_total > 0);
        assert_eq!(stats.objects_pruned, stats.objects_total);
        let reopened = GitStore::open_or_init(store.path()).unwrap();
        assert!(!reopened.has_commit(&checksum));
        assert!(pack_files(&store.path().join("objects/pack")).unwrap().is_empty());
    }

    #[test]
    fn test_repack_keeps_objects_of_other_refs() {
        let temp = TempDir::new().unwrap();
        let upstream = GitStore::open_or_init(&temp.path().join("upstream")).unwrap();
        let beta = RefId::parse("app/org.example.Foo/x86_64/beta").unwrap();
        let stable_sum = upstream
            .commit_dir(&foo_ref(), &payload(&temp, "one"), "first")
            .unwrap();
        let beta_sum = upstream
            .commit_dir(&beta, &payload(&temp, "beta build"), "beta")
            .unwrap();

        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();
        store
            .add_remote("origin", upstream.path().to_str().unwrap())
            .unwrap();
        for (reference, checksum) in [(&foo_ref(), &stable_sum), (&beta, &beta_sum)] {
            store
                .ensure_fetched(reference, Some("origin"), checksum, &Cancellable::new())
                .unwrap();
        }

        store.remove_ref(&foo_ref(), Some("origin")).unwrap();
        let stats = store.prune().unwrap();
        assert!(stats.objects_pruned > 0);

        let reopened = GitStore::open_or_init(store.path()).unwrap();
        assert!(!reopened.has_commit(&stable_sum));
        let dest = temp.path().join("deploy");
        reopened.checkout(&beta_sum, &dest, CheckoutMode::User).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("files/bin/foo")).unwrap(),
            "#!/bin/sh\necho beta build\n"
        );
    }

    #[test]
    fn test_only_auto_created_origins_are_removed() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open_or_init(&temp.path().join("repo")).unwrap();

        store.add_remote("flathub", "https://example.org/repo").unwrap();
        store
            .add_origin_remote("org.example.Foo-origin", "https://example.org/foo")
            .unwrap();
        store
            .add_origin_remote("org.example.Foo-origin", "https://example.org/foo")
            .unwrap();
        assert!(
            store
                .add_origin_remote("org.example.Foo-origin", "https://example.org/other")
                .is_err()
        );

        assert!(!store.remove_origin("flathub").unwrap());
        assert!(!store.remove_origin("missing").unwrap());
        assert!(store.remove_origin("org.example.Foo-origin").unwrap());
        assert_eq!(store.remote_url("org.example.Foo-origin").unwrap(), None);
        assert!(store.remote_url("flathub").unwrap().is_some());
    }

    #[test]
    fn test_normalize_remote_url() {
        assert_eq!(
            normalize_remote_url("git@github.com:user/repo.git"),
            "ssh://git@github.com/user/repo.git"
        );
        assert_eq!(
            normalize_remote_url("https://github.com/user/repo.git"),
            "https://github.com/user/repo.git"
        );
        assert_eq!(normalize_remote_url("/srv/repo"), "/srv/repo");
    }
}
