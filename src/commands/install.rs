//! Install, update and commit commands

use console::Style;

use super::Scope;
use super::progress::FetchProgress;
use crate::cli::{CommitArgs, InstallArgs, UpdateArgs};
use crate::deploy::UndeployOutcome;
use crate::error::Result;
use crate::installation::UpdateOutcome;
use crate::refs::Checksum;

pub fn run(scope: &Scope, args: &InstallArgs) -> Result<()> {
    let reference = args.target.to_ref(&scope.config.default_arch)?;
    let hint = args.commit.as_deref().map(Checksum::parse).transpose()?;

    let store = scope.open_store()?;
    let origin = match &args.from {
        Some(url) => {
            let name = format!("{}-origin", reference.name());
            store.add_origin_remote(&name, url)?;
            Some(name)
        }
        None => args.origin.clone(),
    };

    let progress = FetchProgress::new(&format!("Fetching {}", reference.name()));
    let installation = scope.open_with(store.with_progress(progress.callback()));
    let result = installation.install(&reference, origin.as_deref(), hint.as_ref());
    progress.finish();
    let checksum = result?;

    println!(
        "{} {reference} ({}) in the {} installation",
        Style::new().green().bold().apply_to("Installed"),
        checksum.short(),
        scope.name()
    );
    Ok(())
}

pub fn run_update(scope: &Scope, args: &UpdateArgs) -> Result<()> {
    let reference = args.target.to_ref(&scope.config.default_arch)?;
    let target = args.commit.as_deref().map(Checksum::parse).transpose()?;

    let progress = FetchProgress::new(&format!("Fetching {}", reference.name()));
    let installation = scope.open_with(scope.open_store()?.with_progress(progress.callback()));
    let result = installation.update(&reference, target.as_ref());
    progress.finish();

    match result? {
        UpdateOutcome::NoChange(checksum) => {
            println!("{reference} is already up to date ({})", checksum.short());
        }
        UpdateOutcome::Updated { from, to, previous } => {
            println!(
                "{} {reference}: {} -> {}",
                Style::new().green().bold().apply_to("Updated"),
                from.short(),
                to.short()
            );
            if let UndeployOutcome::Deferred(path) = previous {
                println!(
                    "{}",
                    Style::new().dim().apply_to(format!(
                        "Previous checkout is still in use; it will be removed by `xdgpak cleanup` ({})",
                        path.display()
                    ))
                );
            }
        }
    }
    Ok(())
}

pub fn run_commit(scope: &Scope, args: &CommitArgs) -> Result<()> {
    let reference = args.target.to_ref(&scope.config.default_arch)?;
    let store = scope.open_store()?;
    let checksum = store.commit_dir(&reference, &args.dir, &args.subject)?;
    println!("{checksum}");
    Ok(())
}
