//! CLI integration tests using the REAL xdgpak binary

mod common;

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// Temporary fix for deprecated cargo_bin - will be updated when build-dir issues are resolved
#[allow(deprecated)]
fn xdgpak_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("xdgpak").unwrap();
    cmd.env("XDGPAK_CONFIG", home.join("config.yaml"))
        .env("XDGPAK_USER_DIR", home.join("user"))
        .env("XDGPAK_SYSTEM_DIR", home.join("system"))
        .env("XDGPAK_TRIGGERS_DIR", "")
        .env("XDGPAK_ARCH", "x86_64")
        .env_remove("RUST_LOG");
    cmd
}

fn write_build(dir: &Path) {
    common::write_script(&dir.join("files/bin/foo"), "echo foo");
    let apps = dir.join("files/share/applications");
    fs::create_dir_all(&apps).unwrap();
    fs::write(
        apps.join("org.example.Foo.desktop"),
        "[Desktop Entry]\nName=Foo\nExec=foo\n",
    )
    .unwrap();
}

fn commit_build(home: &Path) -> String {
    let build = home.join("build");
    write_build(&build);
    let output = xdgpak_cmd(home)
        .args(["commit", "org.example.Foo", "--branch", "stable"])
        .arg(&build)
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

#[test]
fn test_help_output() {
    let temp = TempDir::new().unwrap();
    xdgpak_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("uninstall"))
        .stdout(predicate::str::contains("make-current"))
        .stdout(predicate::str::contains("export-refresh"));
}

#[test]
fn test_list_empty_installation() {
    let temp = TempDir::new().unwrap();
    xdgpak_cmd(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing installed."));
}

#[test]
fn test_invalid_ref_is_reported() {
    let temp = TempDir::new().unwrap();
    xdgpak_cmd(temp.path())
        .args(["install", "app/Foo/x86_64/stable"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid ref"));
}

#[test]
fn test_uninstall_not_installed() {
    let temp = TempDir::new().unwrap();
    xdgpak_cmd(temp.path())
        .args(["uninstall", "org.example.Foo", "-y"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not installed"));
}

#[test]
fn test_commit_install_list_uninstall() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let checksum = commit_build(home);
    assert_eq!(checksum.len(), 40);

    xdgpak_cmd(home)
        .args(["install", "org.example.Foo", "--branch", "stable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed"))
        .stdout(predicate::str::contains(&checksum[..12]));

    let ref_dir = home.join("user/app/org.example.Foo/x86_64/stable");
    assert_eq!(
        fs::read_link(ref_dir.join("active")).unwrap().to_str(),
        Some(checksum.as_str())
    );
    assert!(
        home.join("user/exports/share/applications/org.example.Foo.desktop")
            .exists()
    );

    xdgpak_cmd(home)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("app/org.example.Foo/x86_64/stable"))
        .stdout(predicate::str::contains("(current)"));

    let output = xdgpak_cmd(home).args(["list", "--json"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["ref"], "app/org.example.Foo/x86_64/stable");
    assert_eq!(json[0]["active"], checksum.as_str());
    assert_eq!(json[0]["is_current"], true);

    xdgpak_cmd(home)
        .args(["info", "app/org.example.Foo/x86_64/stable"])
        .assert()
        .success()
        .stdout(predicate::str::contains(checksum.as_str()));

    xdgpak_cmd(home)
        .args(["install", "org.example.Foo", "--branch", "stable"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already deployed"));

    xdgpak_cmd(home)
        .args(["uninstall", "org.example.Foo", "--branch", "stable", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Uninstalled"));

    assert!(!home.join("user/app/org.example.Foo").exists());
    xdgpak_cmd(home)
        .args(["list", "--app"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing installed."));
}

#[test]
fn test_system_scope_is_separate() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let build = home.join("build");
    write_build(&build);

    xdgpak_cmd(home)
        .args(["--system", "commit", "org.example.Foo"])
        .arg(&build)
        .assert()
        .success();
    xdgpak_cmd(home)
        .args(["--system", "install", "org.example.Foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("system installation"));

    assert!(home.join("system/app/org.example.Foo/x86_64/master/active").exists());
    assert!(!home.join("user/app").exists());
}

#[test]
fn test_remote_add_and_list() {
    let temp = TempDir::new().unwrap();
    xdgpak_cmd(temp.path())
        .args(["remote-add", "origin", "https://example.org/apps.git"])
        .assert()
        .success();

    xdgpak_cmd(temp.path())
        .arg("remote-list")
        .assert()
        .success()
        .stdout(predicate::str::contains("origin"))
        .stdout(predicate::str::contains("https://example.org/apps.git"));
}

#[test]
fn test_config_file_is_honoured() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    fs::write(home.join("config.yaml"), "launcher: flatrun\n").unwrap();
    commit_build(home);

    xdgpak_cmd(home)
        .args(["install", "org.example.Foo", "--branch", "stable"])
        .assert()
        .success();

    let desktop = fs::read_to_string(
        home.join("user/exports/share/applications/org.example.Foo.desktop"),
    )
    .unwrap();
    assert!(desktop.contains("Exec=flatrun run --branch=stable"));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("config.yaml"), "lock_policy: sometimes\n").unwrap();

    xdgpak_cmd(temp.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.yaml"));
}

#[test]
fn test_completions_bash() {
    let temp = TempDir::new().unwrap();
    xdgpak_cmd(temp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xdgpak"));
}

#[test]
fn test_install_from_url_creates_and_drops_origin() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();
    let build = home.join("build");
    write_build(&build);

    // The system store stands in for a published repository
    xdgpak_cmd(home)
        .args(["--system", "commit", "org.example.Foo"])
        .arg(&build)
        .assert()
        .success();
    let upstream = home.join("system/repo");

    xdgpak_cmd(home)
        .args(["install", "org.example.Foo", "--from"])
        .arg(&upstream)
        .assert()
        .success();
    xdgpak_cmd(home)
        .arg("remote-list")
        .assert()
        .success()
        .stdout(predicate::str::contains("org.example.Foo-origin"));
    xdgpak_cmd(home)
        .args(["info", "org.example.Foo", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"origin\": \"org.example.Foo-origin\""));

    xdgpak_cmd(home)
        .args(["uninstall", "org.example.Foo", "-y"])
        .assert()
        .success();
    xdgpak_cmd(home)
        .arg("remote-list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No remotes configured."));
}
