//! make-current, prune, cleanup and export-refresh

use console::Style;

use super::Scope;
use crate::cli::RefArgs;
use crate::error::Result;

pub fn run_make_current(scope: &Scope, args: &RefArgs) -> Result<()> {
    let reference = args.to_ref(&scope.config.default_arch)?;
    scope.open()?.make_current(&reference)?;
    println!(
        "{} is now the current branch of {}",
        Style::new().cyan().bold().apply_to(&reference),
        reference.name()
    );
    Ok(())
}

pub fn run_prune(scope: &Scope) -> Result<()> {
    let stats = scope.open()?.prune()?;
    println!(
        "Pruned {} of {} objects, {} bytes freed",
        stats.objects_pruned, stats.objects_total, stats.bytes_freed
    );
    Ok(())
}

pub fn run_cleanup(scope: &Scope) -> Result<()> {
    let stats = scope.open()?.cleanup_removed()?;
    println!(
        "Removed {} checkout(s); {} still in use",
        stats.removed, stats.deferred
    );
    Ok(())
}

pub fn run_export_refresh(scope: &Scope) -> Result<()> {
    let report = scope.open()?.update_exports()?;
    println!(
        "Linked {} file(s), removed {} stale link(s), ran {} trigger(s)",
        report.linked,
        report.removed,
        report.triggers.ran.len()
    );

    let warn = Style::new().yellow();
    for err in report.errors.iter().chain(&report.triggers.failed) {
        eprintln!("{} {err}", warn.apply_to("warning:"));
    }
    Ok(())
}
