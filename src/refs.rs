//! Ref identifiers and commit checksums
//!
//! A ref names one installable branch of an application or runtime:
//!
//! ```text
//! app/org.gnome.Builder/x86_64/stable
//! ^^^ ^^^^^^^^^^^^^^^^^ ^^^^^^ ^^^^^^
//! kind      name         arch  branch
//! ```
//!
//! The canonical string form doubles as the on-disk path suffix under the
//! installation base directory.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, refs as errors};

/// Maximum length of an application or runtime name
pub const MAX_NAME_LEN: usize = 255;

/// Whether a ref names an application or a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    App,
    Runtime,
}

impl RefKind {
    /// Name used both in ref strings and as the top-level directory
    pub fn as_str(self) -> &'static str {
        match self {
            RefKind::App => "app",
            RefKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = crate::error::XdgpakError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "app" => Ok(RefKind::App),
            "runtime" => Ok(RefKind::Runtime),
            other => Err(errors::invalid_ref(
                other,
                "kind must be 'app' or 'runtime'",
            )),
        }
    }
}

/// A validated four-part ref identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId {
    kind: RefKind,
    name: String,
    arch: String,
    branch: String,
}

impl RefId {
    /// Build a ref from its parts, validating each one
    pub fn new(
        kind: RefKind,
        name: impl Into<String>,
        arch: impl Into<String>,
        branch: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let arch = arch.into();
        let branch = branch.into();
        let display = format!("{kind}/{name}/{arch}/{branch}");

        check_name(&name).map_err(|reason| errors::invalid_ref(&display, reason))?;
        check_arch(&arch).map_err(|reason| errors::invalid_ref(&display, reason))?;
        check_branch(&branch).map_err(|reason| errors::invalid_ref(&display, reason))?;

        Ok(Self {
            kind,
            name,
            arch,
            branch,
        })
    }

    /// Parse `kind/name/arch/branch`
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 4 {
            return Err(errors::invalid_ref(
                s,
                format!("expected 4 '/'-separated components, found {}", parts.len()),
            ));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(errors::invalid_ref(s, "components must not be empty"));
        }

        let kind = parts[0]
            .parse::<RefKind>()
            .map_err(|_| errors::invalid_ref(s, "kind must be 'app' or 'runtime'"))?;
        Self::new(kind, parts[1], parts[2], parts[3])
    }

    /// Build a ref, defaulting the architecture to the host's
    pub fn compose(kind: RefKind, name: &str, branch: &str, arch: Option<&str>) -> Result<Self> {
        Self::new(kind, name, arch.unwrap_or(default_arch()), branch)
    }

    /// Canonical string form, the inverse of [`RefId::parse`]
    pub fn format(&self) -> String {
        self.to_string()
    }

    /// Relative directory of this ref under an installation base
    pub fn path_suffix(&self) -> PathBuf {
        PathBuf::from(self.kind.as_str())
            .join(&self.name)
            .join(&self.arch)
            .join(&self.branch)
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn is_app(&self) -> bool {
        self.kind == RefKind::App
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.kind, self.name, self.arch, self.branch
        )
    }
}

impl FromStr for RefId {
    type Err = crate::error::XdgpakError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for RefId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Whether `name` is a valid application or runtime name
pub fn is_valid_name(name: &str) -> bool {
    check_name(name).is_ok()
}

/// Whether `branch` is a valid branch name
pub fn is_valid_branch(branch: &str) -> bool {
    check_branch(branch).is_ok()
}

fn check_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name is longer than {MAX_NAME_LEN} characters"));
    }
    if name.starts_with('.') {
        return Err("name must not start with a period".to_string());
    }

    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() < 3 {
        return Err("name must contain at least 3 period-separated elements".to_string());
    }

    for segment in segments {
        let mut chars = segment.chars();
        match chars.next() {
            None => return Err("name must not contain empty elements".to_string()),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(c) => {
                return Err(format!("element '{segment}' must not start with '{c}'"));
            }
        }
        if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(format!("element '{segment}' contains invalid character '{c}'"));
        }
    }

    Ok(())
}

fn check_branch(branch: &str) -> std::result::Result<(), String> {
    let mut chars = branch.chars();
    match chars.next() {
        None => return Err("branch must not be empty".to_string()),
        Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {}
        Some(c) => return Err(format!("branch must not start with '{c}'")),
    }
    if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '_' | '-' | '.'))) {
        return Err(format!("branch contains invalid character '{c}'"));
    }
    Ok(())
}

fn check_arch(arch: &str) -> std::result::Result<(), String> {
    if arch.is_empty() {
        return Err("arch must not be empty".to_string());
    }
    if arch.contains('/') || arch.starts_with('.') {
        return Err(format!("arch '{arch}' is not a valid path element"));
    }
    Ok(())
}

/// The host's architecture, in the naming refs use
pub fn default_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// A commit id in the content store
///
/// Checksums are opaque lowercase hex digests; 40 characters for SHA-1 stores
/// and 64 for SHA-256 ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

impl Checksum {
    pub fn parse(s: &str) -> Result<Self> {
        if is_checksum(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(errors::invalid_checksum(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Checksum {
    type Err = crate::error::XdgpakError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = crate::error::XdgpakError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Checksum> for String {
    fn from(c: Checksum) -> Self {
        c.0
    }
}

/// Whether a directory entry name looks like a deployed checksum
pub fn is_checksum(s: &str) -> bool {
    (s.len() == 40 || s.len() == 64) && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
