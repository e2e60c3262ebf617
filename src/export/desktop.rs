//! Rewriting of exported launcher files
//!
//! Desktop entries and D-Bus service files are copied out of the sandbox, so
//! their `Exec` lines must re-enter it through the launcher. For an app
//! `org.example.Foo` on `x86_64/stable`:
//!
//! ```text
//! Exec=foo --bar %U
//! ```
//!
//! becomes
//!
//! ```text
//! Exec=xdgpak run --branch=stable --arch=x86_64 --command=foo org.example.Foo --bar %U
//! ```

use std::path::Path;

use super::ExportContext;
use super::keyfile::KeyFile;
use super::shell;
use crate::error::{Result, export as errors};

pub const DESKTOP_GROUP: &str = "Desktop Entry";
pub const DBUS_GROUP: &str = "D-BUS Service";

/// Key marking an exported entry with the app it came from
pub const APP_MARKER_KEY: &str = "X-Xdgpak";

/// Keys that are meaningless or leak host details once sandboxed
const STRIPPED_KEYS: &[&str] = &["TryExec", "X-GNOME-Bugzilla-ExtraInfoScript"];

/// Rewrite a `.desktop` file for export
pub fn rewrite_desktop_entry(path: &Path, data: &[u8], ctx: &ExportContext) -> Result<Vec<u8>> {
    let mut file = parse(path, data)?;
    if !file.has_group(DESKTOP_GROUP) {
        return Err(errors::rejected(path, "missing [Desktop Entry] group"));
    }

    let groups: Vec<String> = file.group_names().map(str::to_string).collect();
    for group in &groups {
        for key in STRIPPED_KEYS {
            file.remove_key(group, key);
        }
        rewrite_exec(&mut file, group, path, ctx)?;
    }
    file.set_string(DESKTOP_GROUP, APP_MARKER_KEY, &ctx.app_id);

    Ok(file.to_string().into_bytes())
}

/// Validate and rewrite a D-Bus `.service` file for export
///
/// The bus name must match the file name so an app cannot claim another
/// app's name on the session bus.
pub fn rewrite_dbus_service(path: &Path, data: &[u8], ctx: &ExportContext) -> Result<Vec<u8>> {
    let mut file = parse(path, data)?;

    let expected = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".service"))
        .ok_or_else(|| errors::rejected(path, "service file name must end in .service"))?;

    if !file.has_group(DBUS_GROUP) {
        return Err(errors::rejected(path, "missing [D-BUS Service] group"));
    }
    match file.get_string(DBUS_GROUP, "Name") {
        Some(name) if name == expected => {}
        Some(name) => {
            return Err(errors::rejected(
                path,
                format!("bus name '{name}' does not match file name"),
            ));
        }
        None => return Err(errors::rejected(path, "missing Name key")),
    }

    for key in STRIPPED_KEYS {
        file.remove_key(DBUS_GROUP, key);
    }
    rewrite_exec(&mut file, DBUS_GROUP, path, ctx)?;

    Ok(file.to_string().into_bytes())
}

/// The launcher command line replacing an original `Exec` value
pub fn launcher_command(argv: &[String], ctx: &ExportContext) -> String {
    let mut command = format!(
        "{} run --branch={} --arch={}",
        shell::maybe_quote(&ctx.launcher),
        shell::maybe_quote(&ctx.branch),
        shell::maybe_quote(&ctx.arch),
    );
    if let Some(program) = argv.first() {
        command.push_str(" --command=");
        command.push_str(&shell::maybe_quote(program));
    }
    command.push(' ');
    command.push_str(&ctx.app_id);
    for arg in argv.iter().skip(1) {
        command.push(' ');
        command.push_str(&shell::maybe_quote(arg));
    }
    command
}

fn rewrite_exec(file: &mut KeyFile, group: &str, path: &Path, ctx: &ExportContext) -> Result<()> {
    let Some(exec) = file.get_string(group, "Exec") else {
        return Ok(());
    };
    let argv = shell::split(&exec)
        .map_err(|e| errors::rejected(path, format!("cannot parse Exec in [{group}]: {e}")))?;
    file.set_string(group, "Exec", &launcher_command(&argv, ctx));
    Ok(())
}

fn parse(path: &Path, data: &[u8]) -> Result<KeyFile> {
    let text = std::str::from_utf8(data).map_err(|_| errors::rejected(path, "not valid UTF-8"))?;
    KeyFile::parse(text).map_err(|e| errors::rejected(path, e.to_string()))
}
