//! CLI definitions using clap derive API
//!
//! Argument types live next to the commands that share them:
//! - target: ref selection shared by most commands
//! - install: install, update and commit
//! - uninstall: uninstall
//! - list: list and info
//! - remote: remote-add and remote-list
//! - completions: shell completions

use clap::builder::{Styles, styling::AnsiColor};
use clap::{ArgAction, Parser, Subcommand};

pub mod completions;
pub mod install;
pub mod list;
pub mod remote;
pub mod target;
pub mod uninstall;

pub use completions::CompletionsArgs;
pub use install::{CommitArgs, InstallArgs, UpdateArgs};
pub use list::{InfoArgs, ListArgs};
pub use remote::RemoteAddArgs;
pub use target::RefArgs;
pub use uninstall::UninstallArgs;

/// xdgpak - sandboxed application deployments
#[derive(Parser, Debug)]
#[command(
    name = "xdgpak",
    author,
    version,
    color = clap::ColorChoice::Auto,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Install and manage sandboxed desktop applications and runtimes",
    long_about = "xdgpak deploys immutable, content-addressed checkouts of applications and \
                  runtimes into an installation directory, keeps one active checkout per ref \
                  and exports desktop files so the host can launch them.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n   \
                  xdgpak remote-add origin https://example.org/apps.git   \x1b[90m# Register a remote\x1b[0m\n   \
                  xdgpak install org.example.Foo --origin origin          \x1b[90m# Install an app\x1b[0m\n   \
                  xdgpak update org.example.Foo                           \x1b[90m# Move it to the remote tip\x1b[0m\n   \
                  xdgpak list --app                                       \x1b[90m# Installed apps\x1b[0m\n   \
                  xdgpak --system uninstall org.example.Foo -y            \x1b[90m# Remove a system install\x1b[0m\n\n\
                  "
)]
pub struct Cli {
    /// Operate on the per-user installation (default)
    #[arg(long, global = true, conflicts_with = "system")]
    pub user: bool,

    /// Operate on the system-wide installation
    #[arg(long, global = true)]
    pub system: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Whether the per-user installation is selected
    pub fn is_user(&self) -> bool {
        !self.system
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install an application or runtime
    Install(InstallArgs),

    /// Update an installed ref to a newer commit
    Update(UpdateArgs),

    /// Remove an installed ref
    Uninstall(UninstallArgs),

    /// Make an installed branch the default for its application
    #[command(name = "make-current")]
    MakeCurrent(RefArgs),

    /// List installed refs
    List(ListArgs),

    /// Show details of an installed ref
    Info(InfoArgs),

    /// Record a directory tree as a new commit of a ref
    Commit(CommitArgs),

    /// Remove unreachable objects from the content store
    Prune,

    /// Delete removed checkouts that are no longer in use
    Cleanup,

    /// Rebuild the export overlay and run triggers
    #[command(name = "export-refresh")]
    ExportRefresh,

    /// Register a remote repository
    #[command(name = "remote-add")]
    RemoteAdd(RemoteAddArgs),

    /// List registered remotes
    #[command(name = "remote-list")]
    RemoteList,

    /// Generate shell completions
    Completions(CompletionsArgs),
}
