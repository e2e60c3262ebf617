//! Configuration for xdgpak
//!
//! Settings come from three layers, later ones winning:
//! - built-in defaults
//! - `config.yaml` (`$XDGPAK_CONFIG`, else `<config dir>/xdgpak/config.yaml`)
//! - environment overrides (see [`env`])
//!
//! ```yaml
//! user_dir: /home/me/.local/share/xdgpak
//! system_dir: /var/lib/xdgpak
//! launcher: xdgpak
//! triggers_dir: /usr/share/xdgpak/triggers
//! default_arch: x86_64
//! lock_policy: wait
//! auto_prune: true
//! ```

pub mod env;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::fs::is_missing;
use crate::error::{Result, config as errors};
use crate::lock::LockPolicy;
use crate::refs;

pub const DEFAULT_LAUNCHER: &str = "xdgpak";
pub const DEFAULT_SYSTEM_DIR: &str = "/var/lib/xdgpak";
pub const DEFAULT_TRIGGERS_DIR: &str = "/usr/share/xdgpak/triggers";

/// Effective configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Per-user installation directory
    pub user_dir: PathBuf,

    /// System-wide installation directory
    pub system_dir: PathBuf,

    /// Command written into exported launchers
    pub launcher: String,

    /// Directory holding `*.trigger` hooks; empty disables triggers
    pub triggers_dir: Option<PathBuf>,

    /// Architecture used when a ref is given without one
    pub default_arch: String,

    pub lock_policy: LockPolicy,

    /// Prune the content store after update and uninstall
    pub auto_prune: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_dir: default_user_dir(),
            system_dir: PathBuf::from(DEFAULT_SYSTEM_DIR),
            launcher: DEFAULT_LAUNCHER.to_string(),
            triggers_dir: Some(PathBuf::from(DEFAULT_TRIGGERS_DIR)),
            default_arch: refs::default_arch().to_string(),
            lock_policy: LockPolicy::default(),
            auto_prune: true,
        }
    }
}

impl Config {
    /// Load configuration using the process environment
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = lookup(env::CONFIG)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) => Self::from_file(&path)?.unwrap_or_default(),
            None => Self::default(),
        };
        env::apply_overrides(&mut config, &lookup);
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; `None` if it does not exist
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if is_missing(&err) => return Ok(None),
            Err(err) => return Err(errors::read_failed(path, err)),
        };
        Self::from_yaml(&content)
            .map(Some)
            .map_err(|e| errors::parse_failed(path, e))
    }

    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Installation directory for the user or the system scope
    pub fn installation_dir(&self, user: bool) -> &Path {
        if user { &self.user_dir } else { &self.system_dir }
    }

    pub fn validate(&self) -> Result<()> {
        if self.launcher.trim().is_empty() {
            return Err(errors::invalid("launcher must not be empty"));
        }
        if self.default_arch.is_empty() || self.default_arch.contains('/') {
            return Err(errors::invalid(format!(
                "'{}' is not a valid architecture",
                self.default_arch
            )));
        }
        for (name, dir) in [("user_dir", &self.user_dir), ("system_dir", &self.system_dir)] {
            if !dir.is_absolute() {
                return Err(errors::invalid(format!(
                    "{name} must be an absolute path, got {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

fn default_user_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("xdgpak")
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("xdgpak").join("config.yaml"))
}
