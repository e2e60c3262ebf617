//! xdgpak - install and manage sandboxed desktop applications
//!
//! Thin binary over the `xdgpak` library: parse arguments, set up logging,
//! run the command and report any error with its diagnostic code and help.

use clap::Parser;
use console::Style;
use miette::Diagnostic;

use xdgpak::cli::Cli;
use xdgpak::{XdgpakError, commands, logging};

fn report(err: &XdgpakError) {
    let code = err.code().map(|c| format!(" [{c}]")).unwrap_or_default();
    eprintln!("{} {err}{code}", Style::new().red().bold().apply_to("error:"));
    if let Some(help) = err.help() {
        eprintln!("  {} {help}", Style::new().cyan().apply_to("help:"));
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = commands::run(cli) {
        report(&e);
        std::process::exit(1);
    }
}
