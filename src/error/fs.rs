//! File system errors

use std::path::Path;

use super::{Result, XdgpakError};

/// Creates an IO error for a path
pub fn io_error(path: &Path, source: std::io::Error) -> XdgpakError {
    XdgpakError::IoError {
        path: path.display().to_string(),
        source,
    }
}

/// Attach the offending path to a raw `std::io::Result`
pub trait IoResultExt<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| io_error(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_path_keeps_kind() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_path(Path::new("/base/lock")).unwrap_err();
        match err {
            XdgpakError::IoError { path, source } => {
                assert_eq!(path, "/base/lock");
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
