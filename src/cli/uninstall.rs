use clap::Parser;

use super::RefArgs;

/// Arguments for the uninstall command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Uninstall an app:\n    xdgpak uninstall org.example.Foo\n\n\
                  Uninstall without confirmation:\n    xdgpak uninstall org.example.Foo -y\n\n\
                  Delete checkouts even while they are running:\n    xdgpak uninstall org.example.Foo --force")]
pub struct UninstallArgs {
    #[command(flatten)]
    pub target: RefArgs,

    /// Delete checkouts even if a running instance holds them
    #[arg(long)]
    pub force: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_cli_parsing_uninstall() {
        let cli = Cli::try_parse_from(["xdgpak", "uninstall", "org.example.Foo"]).unwrap();
        match cli.command {
            Commands::Uninstall(args) => {
                assert_eq!(args.target.reference, "org.example.Foo");
                assert!(!args.yes);
                assert!(!args.force);
            }
            _ => panic!("Expected Uninstall command"),
        }
    }

    #[test]
    fn test_cli_parsing_uninstall_forced() {
        let cli =
            Cli::try_parse_from(["xdgpak", "uninstall", "org.example.Foo", "--force", "-y"]).unwrap();
        match cli.command {
            Commands::Uninstall(args) => assert!(args.force && args.yes),
            _ => panic!("Expected Uninstall command"),
        }
    }
}
