//! Error types and handling for xdgpak
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain, each providing
//! small constructor helpers:
//! - [`refs`]: Ref and checksum validation errors
//! - [`deploy`]: Deployment state errors
//! - [`lock`]: Installation and checkout lock errors
//! - [`store`]: Content store errors
//! - [`export`]: Export overlay and trigger errors
//! - [`config`]: Configuration errors
//! - [`fs`]: File system errors

pub mod config;
pub mod deploy;
pub mod export;
pub mod fs;
pub mod lock;
pub mod refs;
pub mod store;

pub use fs::IoResultExt;

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for xdgpak operations
#[derive(Error, Diagnostic, Debug)]
pub enum XdgpakError {
    // Ref errors
    #[error("Invalid ref '{reference}': {reason}")]
    #[diagnostic(
        code(xdgpak::refs::invalid),
        help("Refs have the form app/org.example.App/x86_64/stable")
    )]
    InvalidRef { reference: String, reason: String },

    #[error("Invalid checksum '{checksum}'")]
    #[diagnostic(
        code(xdgpak::refs::invalid_checksum),
        help("Checksums are 40 or 64 lowercase hexadecimal characters")
    )]
    InvalidChecksum { checksum: String },

    // Deployment errors
    #[error("{reference} commit {checksum} is already deployed")]
    #[diagnostic(
        code(xdgpak::deploy::already_deployed),
        help("Use 'xdgpak update' to move to a newer commit")
    )]
    AlreadyDeployed { reference: String, checksum: String },

    #[error("{reference} commit {checksum} is not deployed")]
    #[diagnostic(code(xdgpak::deploy::already_undeployed))]
    AlreadyUndeployed { reference: String, checksum: String },

    #[error("{reference} is not installed")]
    #[diagnostic(
        code(xdgpak::deploy::not_installed),
        help("Run 'xdgpak list' to see installed refs")
    )]
    NotInstalled { reference: String },

    // Lock errors
    #[error("Installation at {path} is locked by another process")]
    #[diagnostic(
        code(xdgpak::lock::busy),
        help("Another install, update or uninstall is running; retry once it finishes")
    )]
    LockBusy { path: String },

    #[error("Failed to lock {path}: {reason}")]
    #[diagnostic(code(xdgpak::lock::failed))]
    LockFailed { path: String, reason: String },

    // Content store errors
    #[error("Failed to fetch {reference}: {reason}")]
    #[diagnostic(
        code(xdgpak::store::fetch_failed),
        help("Check that the origin remote is reachable and carries this ref")
    )]
    FetchError {
        reference: String,
        checksum: Option<String>,
        reason: String,
    },

    #[error("Operation cancelled")]
    #[diagnostic(code(xdgpak::store::cancelled))]
    Cancelled,

    #[error("Content store error: {message}")]
    #[diagnostic(code(xdgpak::store::operation_failed))]
    StoreError { message: String },

    // Export errors
    #[error("Rejected export file {path}: {reason}")]
    #[diagnostic(code(xdgpak::export::rejected))]
    ExportRejected { path: String, reason: String },

    #[error("Trigger {name} failed: {reason}")]
    #[diagnostic(code(xdgpak::export::trigger_failed))]
    TriggerFailed { name: String, reason: String },

    // Configuration errors
    #[error("Failed to read configuration file: {path}")]
    #[diagnostic(code(xdgpak::config::read_failed))]
    ConfigReadFailed { path: String, reason: String },

    #[error("Failed to parse configuration file: {path}")]
    #[diagnostic(code(xdgpak::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(xdgpak::config::invalid))]
    ConfigInvalid { message: String },

    // File system errors
    #[error("IO error at {path}: {source}")]
    #[diagnostic(code(xdgpak::fs::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl XdgpakError {
    /// Whether the caller may retry the failed operation unchanged.
    ///
    /// Lock contention clears once the other process finishes; fetch failures
    /// follow the content store's own retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockBusy { .. } | Self::FetchError { .. })
    }
}

impl From<std::io::Error> for XdgpakError {
    fn from(err: std::io::Error) -> Self {
        XdgpakError::IoError {
            path: String::new(),
            source: err,
        }
    }
}

impl From<serde_yaml::Error> for XdgpakError {
    fn from(err: serde_yaml::Error) -> Self {
        XdgpakError::ConfigParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<git2::Error> for XdgpakError {
    fn from(err: git2::Error) -> Self {
        XdgpakError::StoreError {
            message: err.message().to_string(),
        }
    }
}

impl From<serde_json::Error> for XdgpakError {
    fn from(err: serde_json::Error) -> Self {
        XdgpakError::IoError {
            path: "<json>".to_string(),
            source: std::io::Error::other(err.to_string()),
        }
    }
}

impl From<inquire::InquireError> for XdgpakError {
    fn from(err: inquire::InquireError) -> Self {
        match err {
            inquire::InquireError::OperationCanceled
            | inquire::InquireError::OperationInterrupted => XdgpakError::Cancelled,
            other => XdgpakError::IoError {
                path: "<terminal>".to_string(),
                source: std::io::Error::other(other.to_string()),
            },
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, XdgpakError>;
