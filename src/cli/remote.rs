use clap::Parser;

/// Arguments for the remote-add command
#[derive(Parser, Debug)]
pub struct RemoteAddArgs {
    /// Name used with --origin
    pub name: String,

    /// Git URL of the repository
    pub url: String,
}
