//! List and info commands

use console::Style;

use super::Scope;
use crate::cli::{InfoArgs, ListArgs};
use crate::error::{Result, deploy as errors};
use crate::installation::RefInfo;
use crate::refs::RefKind;

pub fn run(scope: &Scope, args: &ListArgs) -> Result<()> {
    let kinds: &[RefKind] = match (args.app, args.runtime) {
        (true, _) => &[RefKind::App],
        (_, true) => &[RefKind::Runtime],
        _ => &[RefKind::App, RefKind::Runtime],
    };

    let installation = scope.open()?;
    let mut infos = Vec::new();
    for kind in kinds {
        for reference in installation.list_refs(*kind)? {
            infos.push(installation.info(&reference)?);
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&infos)?;
        println!("{json}");
        return Ok(());
    }

    if infos.is_empty() {
        println!("Nothing installed.");
        return Ok(());
    }

    println!("Installed refs ({}):", infos.len());
    println!();
    for info in &infos {
        print_row(info);
    }
    Ok(())
}

fn print_row(info: &RefInfo) {
    let active = info
        .active
        .as_ref()
        .map_or_else(|| "-".to_string(), |c| c.short().to_string());
    let origin = info.origin.as_deref().unwrap_or("-");
    let marker = if info.is_current {
        Style::new().green().apply_to(" (current)").to_string()
    } else {
        String::new()
    };
    println!(
        "  {}{marker}  {}  {}",
        Style::new().cyan().bold().apply_to(&info.reference),
        Style::new().yellow().apply_to(active),
        Style::new().dim().apply_to(origin)
    );
}

pub fn run_info(scope: &Scope, args: &InfoArgs) -> Result<()> {
    let reference = args.target.to_ref(&scope.config.default_arch)?;
    let installation = scope.open()?;
    let info = installation.info(&reference)?;
    if info.deployed.is_empty() {
        return Err(errors::not_installed(&reference));
    }

    if args.json {
        let json = serde_json::to_string_pretty(&info)?;
        println!("{json}");
        return Ok(());
    }

    let label = Style::new().bold();
    println!("{}", Style::new().cyan().bold().apply_to(&info.reference));
    println!(
        "  {} {}",
        label.apply_to("Active:"),
        info.active.as_ref().map_or("none", |c| c.as_str())
    );
    println!(
        "  {} {}",
        label.apply_to("Origin:"),
        info.origin.as_deref().unwrap_or("none")
    );
    if info.reference.is_app() {
        println!("  {} {}", label.apply_to("Current:"), info.is_current);
    }
    if let Some(files) = &info.files {
        println!("  {} {}", label.apply_to("Files:"), files.display());
    }
    if info.deployed.len() > 1 {
        println!("  {}", label.apply_to("Deployed:"));
        for checksum in &info.deployed {
            println!("    {checksum}");
        }
    }
    Ok(())
}
