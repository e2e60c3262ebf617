//! Command implementations for the xdgpak CLI
//!
//! Each handler turns parsed arguments into calls on an
//! [`InstallationDirectory`] and prints the outcome.

pub mod completions;
pub mod install;
pub mod list;
pub mod maintenance;
pub mod progress;
pub mod remote;
pub mod uninstall;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::Result;
use crate::installation::{InstallationDirectory, InstallationOptions, REPO_DIR};
use crate::store::GitStore;

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions(args) = cli.command {
        return completions::run(&args);
    }

    let config = Config::load()?;
    let scope = Scope::new(config, cli.is_user());

    match cli.command {
        Commands::Install(args) => install::run(&scope, &args),
        Commands::Update(args) => install::run_update(&scope, &args),
        Commands::Commit(args) => install::run_commit(&scope, &args),
        Commands::Uninstall(args) => uninstall::run(&scope, &args),
        Commands::MakeCurrent(args) => maintenance::run_make_current(&scope, &args),
        Commands::List(args) => list::run(&scope, &args),
        Commands::Info(args) => list::run_info(&scope, &args),
        Commands::Prune => maintenance::run_prune(&scope),
        Commands::Cleanup => maintenance::run_cleanup(&scope),
        Commands::ExportRefresh => maintenance::run_export_refresh(&scope),
        Commands::RemoteAdd(args) => remote::run_add(&scope, &args),
        Commands::RemoteList => remote::run_list(&scope),
        Commands::Completions(_) => Ok(()),
    }
}

/// Loaded configuration plus the selected installation
pub struct Scope {
    pub config: Config,
    pub user: bool,
}

impl Scope {
    pub fn new(config: Config, user: bool) -> Self {
        Self { config, user }
    }

    pub fn name(&self) -> &'static str {
        if self.user { "user" } else { "system" }
    }

    /// The content store of the selected installation
    pub fn open_store(&self) -> Result<GitStore> {
        let base = self.config.installation_dir(self.user);
        GitStore::open_or_init(&base.join(REPO_DIR))
    }

    /// Open the installation around an already configured store
    pub fn open_with(&self, store: GitStore) -> InstallationDirectory {
        InstallationDirectory::open(
            self.config.installation_dir(self.user),
            Box::new(store),
            InstallationOptions::from_config(&self.config, self.user),
        )
    }

    pub fn open(&self) -> Result<InstallationDirectory> {
        Ok(self.open_with(self.open_store()?))
    }
}
