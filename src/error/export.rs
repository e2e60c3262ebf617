//! Export overlay and trigger errors

use std::path::Path;

use super::XdgpakError;

/// Creates an export rejected error
pub fn rejected(path: &Path, reason: impl Into<String>) -> XdgpakError {
    XdgpakError::ExportRejected {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Creates a trigger failed error
pub fn trigger_failed(name: impl Into<String>, reason: impl Into<String>) -> XdgpakError {
    XdgpakError::TriggerFailed {
        name: name.into(),
        reason: reason.into(),
    }
}
