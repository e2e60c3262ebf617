//! Content store errors

use super::XdgpakError;
use crate::refs::{Checksum, RefId};

/// Creates a fetch error for a ref, optionally naming the commit
pub fn fetch_failed(
    reference: &RefId,
    checksum: Option<&Checksum>,
    reason: impl Into<String>,
) -> XdgpakError {
    XdgpakError::FetchError {
        reference: reference.to_string(),
        checksum: checksum.map(ToString::to_string),
        reason: reason.into(),
    }
}

/// Creates a generic content store error
pub fn operation_failed(message: impl Into<String>) -> XdgpakError {
    XdgpakError::StoreError {
        message: message.into(),
    }
}
