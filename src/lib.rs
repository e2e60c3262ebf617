//! xdgpak - installation directory and deployment engine
//!
//! Installs, updates and removes immutable, content-addressed deployments of
//! sandboxed applications and runtimes, and publishes their desktop files
//! through an export overlay. The engine lives in [`installation`]; the
//! content store behind it is a bare git repository ([`store::GitStore`]).

pub mod cli;
pub mod commands;
pub mod common;
pub mod config;
pub mod deploy;
pub mod error;
pub mod export;
pub mod installation;
pub mod lock;
pub mod logging;
pub mod refs;
pub mod store;
pub mod triggers;

pub use error::{Result, XdgpakError};
pub use installation::{InstallationDirectory, InstallationOptions};
pub use refs::{Checksum, RefId, RefKind};
