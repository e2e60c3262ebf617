//! Remote management commands

use console::Style;

use super::Scope;
use crate::cli::RemoteAddArgs;
use crate::error::Result;

pub fn run_add(scope: &Scope, args: &RemoteAddArgs) -> Result<()> {
    scope.open_store()?.add_remote(&args.name, &args.url)?;
    println!(
        "{} remote {}",
        Style::new().green().bold().apply_to("Added"),
        args.name
    );
    Ok(())
}

pub fn run_list(scope: &Scope) -> Result<()> {
    let remotes = scope.open_store()?.list_remotes()?;
    if remotes.is_empty() {
        println!("No remotes configured.");
        return Ok(());
    }
    for (name, url) in remotes {
        println!("{}\t{url}", Style::new().cyan().apply_to(name));
    }
    Ok(())
}
