//! Lock errors

use std::path::Path;

use super::XdgpakError;

/// Creates a lock busy error
pub fn busy(path: &Path) -> XdgpakError {
    XdgpakError::LockBusy {
        path: path.display().to_string(),
    }
}

/// Creates a lock failed error
pub fn failed(path: &Path, reason: impl std::fmt::Display) -> XdgpakError {
    XdgpakError::LockFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
