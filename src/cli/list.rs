use clap::Parser;

use super::RefArgs;

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only list applications
    #[arg(long, conflicts_with = "runtime")]
    pub app: bool,

    /// Only list runtimes
    #[arg(long)]
    pub runtime: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub target: RefArgs,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}
