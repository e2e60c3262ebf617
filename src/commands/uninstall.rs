//! Uninstall command

use console::Style;
use inquire::Confirm;

use super::Scope;
use crate::cli::UninstallArgs;
use crate::error::{Result, deploy as errors};
use crate::refs::RefId;

pub fn run(scope: &Scope, args: &UninstallArgs) -> Result<()> {
    let reference = args.target.to_ref(&scope.config.default_arch)?;
    let installation = scope.open()?;

    let deployed = installation.deployment_state(&reference).list_deployed()?;
    if deployed.is_empty() {
        return Err(errors::not_installed(&reference));
    }
    if !args.yes && !confirm(&reference, deployed.len())? {
        println!("Uninstall cancelled.");
        return Ok(());
    }

    let outcome = installation.uninstall(&reference, args.force)?;
    println!(
        "{} {reference}",
        Style::new().green().bold().apply_to("Uninstalled")
    );
    for checksum in &outcome.deferred {
        println!(
            "{}",
            Style::new().dim().apply_to(format!(
                "Checkout {} is still in use; it will be removed by `xdgpak cleanup`",
                checksum.short()
            ))
        );
    }
    Ok(())
}

fn confirm(reference: &RefId, checkouts: usize) -> Result<bool> {
    println!("\n{reference} will be uninstalled ({checkouts} checkout(s)).\n");
    Ok(Confirm::new("Proceed with uninstall?")
        .with_default(true)
        .with_help_message("Press Enter to confirm, or 'n' to cancel")
        .prompt()?)
}
