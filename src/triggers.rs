//! Post-export hooks
//!
//! After the export overlay changes, every executable `*.trigger` file in the
//! triggers directory runs with the installation base as its only argument.
//! Typical triggers rebuild the desktop database, the icon cache or the
//! MIME cache from `<base>/exports/share`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{XdgpakError, export as errors};

const TRIGGER_SUFFIX: &str = ".trigger";

/// Outcome of a trigger run
#[derive(Debug, Default)]
pub struct TriggerReport {
    pub ran: Vec<String>,
    pub failed: Vec<XdgpakError>,
}

/// Runs hooks from a triggers directory
#[derive(Debug, Clone, Default)]
pub struct TriggerRunner {
    dir: Option<PathBuf>,
}

impl TriggerRunner {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Executable trigger files in lexicographic order
    pub fn discover(&self) -> Vec<PathBuf> {
        let Some(dir) = &self.dir else {
            return Vec::new();
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut triggers: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(TRIGGER_SUFFIX))
            })
            .filter(|p| {
                fs::metadata(p).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            })
            .collect();
        triggers.sort();
        triggers
    }

    /// Run every trigger against `base`
    ///
    /// Failures are logged and reported; they never abort the run.
    pub fn run(&self, base: &Path) -> TriggerReport {
        let mut report = TriggerReport::default();

        for trigger in self.discover() {
            let name = trigger
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::debug!("running trigger {name}");

            match Command::new(&trigger).arg(base).output() {
                Ok(output) if output.status.success() => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    if !stdout.trim().is_empty() {
                        tracing::debug!("{name}: {}", stdout.trim_end());
                    }
                    report.ran.push(name);
                }
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let reason = format!("{}: {}", output.status, stderr.trim_end());
                    tracing::warn!("trigger {name} failed: {reason}");
                    report.failed.push(errors::trigger_failed(&name, reason));
                }
                Err(err) => {
                    tracing::warn!("trigger {name} could not run: {err}");
                    report.failed.push(errors::trigger_failed(&name, err.to_string()));
                }
            }
        }

        report
    }
}
