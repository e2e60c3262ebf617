//! Deployment state errors

use super::XdgpakError;
use crate::refs::{Checksum, RefId};

/// Creates an already deployed error
pub fn already_deployed(reference: &RefId, checksum: &Checksum) -> XdgpakError {
    XdgpakError::AlreadyDeployed {
        reference: reference.to_string(),
        checksum: checksum.to_string(),
    }
}

/// Creates an already undeployed error
pub fn already_undeployed(reference: &RefId, checksum: &Checksum) -> XdgpakError {
    XdgpakError::AlreadyUndeployed {
        reference: reference.to_string(),
        checksum: checksum.to_string(),
    }
}

/// Creates a not installed error
pub fn not_installed(reference: &RefId) -> XdgpakError {
    XdgpakError::NotInstalled {
        reference: reference.to_string(),
    }
}
