//! Ref and checksum validation errors

use super::XdgpakError;

/// Creates an invalid ref error
pub fn invalid_ref(reference: impl Into<String>, reason: impl Into<String>) -> XdgpakError {
    XdgpakError::InvalidRef {
        reference: reference.into(),
        reason: reason.into(),
    }
}

/// Creates an invalid checksum error
pub fn invalid_checksum(checksum: impl Into<String>) -> XdgpakError {
    XdgpakError::InvalidChecksum {
        checksum: checksum.into(),
    }
}
