use std::path::PathBuf;

use clap::Parser;

use super::RefArgs;

/// Arguments for the install command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Install the master branch of an app:\n    xdgpak install org.example.Foo --origin origin\n\n\
                  Install a runtime branch:\n    xdgpak install org.example.Platform --runtime --branch 23.08\n\n\
                  Install straight from a repository URL:\n    xdgpak install org.example.Foo --from https://example.org/apps.git\n\n\
                  Install a specific commit:\n    xdgpak install app/org.example.Foo/x86_64/stable --commit 3f2a...\n\n\
                  Install from the local store only:\n    xdgpak install org.example.Foo")]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: RefArgs,

    /// Remote to fetch from; recorded for later updates
    #[arg(long, conflicts_with = "from")]
    pub origin: Option<String>,

    /// Fetch from this repository URL through a remote created for the app
    #[arg(long, value_name = "URL")]
    pub from: Option<String>,

    /// Deploy this commit instead of the branch tip
    #[arg(long)]
    pub commit: Option<String>,
}

/// Arguments for the update command
#[derive(Parser, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub target: RefArgs,

    /// Move to this commit instead of the origin's tip
    #[arg(long)]
    pub commit: Option<String>,
}

/// Arguments for the commit command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Record a build as the new tip of a branch:\n    xdgpak commit org.example.Foo ./build --branch stable")]
pub struct CommitArgs {
    #[command(flatten)]
    pub target: RefArgs,

    /// Directory holding files/ and metadata of the build
    pub dir: PathBuf,

    /// Commit message
    #[arg(long, short = 'm', default_value = "Build")]
    pub subject: String,
}
