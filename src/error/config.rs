//! Configuration errors

use std::path::Path;

use super::XdgpakError;

/// Creates a config read failed error
pub fn read_failed(path: &Path, reason: impl std::fmt::Display) -> XdgpakError {
    XdgpakError::ConfigReadFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates a config parse failed error
pub fn parse_failed(path: &Path, reason: impl std::fmt::Display) -> XdgpakError {
    XdgpakError::ConfigParseFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Creates a config invalid error
pub fn invalid(message: impl Into<String>) -> XdgpakError {
    XdgpakError::ConfigInvalid {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_failed_carries_path() {
        let err = parse_failed(&PathBuf::from("/etc/xdgpak/config.yaml"), "bad indent");
        assert!(matches!(err, XdgpakError::ConfigParseFailed { .. }));
        assert!(err.to_string().contains("/etc/xdgpak/config.yaml"));
    }

    #[test]
    fn test_invalid() {
        let err = invalid("launcher must not be empty");
        assert!(err.to_string().contains("Invalid configuration"));
    }
}
