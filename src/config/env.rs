//! Environment variable overrides

use std::path::PathBuf;

use super::Config;

/// Path of the config file to load
pub const CONFIG: &str = "XDGPAK_CONFIG";
pub const USER_DIR: &str = "XDGPAK_USER_DIR";
pub const SYSTEM_DIR: &str = "XDGPAK_SYSTEM_DIR";
/// Triggers directory; an empty value disables triggers
pub const TRIGGERS_DIR: &str = "XDGPAK_TRIGGERS_DIR";
pub const ARCH: &str = "XDGPAK_ARCH";

pub(super) fn apply_overrides(config: &mut Config, lookup: &impl Fn(&str) -> Option<String>) {
    if let Some(dir) = lookup(USER_DIR).filter(|v| !v.is_empty()) {
        config.user_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup(SYSTEM_DIR).filter(|v| !v.is_empty()) {
        config.system_dir = PathBuf::from(dir);
    }
    if let Some(dir) = lookup(TRIGGERS_DIR) {
        config.triggers_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
    }
    if let Some(arch) = lookup(ARCH).filter(|v| !v.is_empty()) {
        config.default_arch = arch;
    }
}
