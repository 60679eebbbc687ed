//! Outdated command - packages built from an old recipe revision

use super::open_store;
use crate::cli::args::{OutdatedArgs, OutputFormat};
use crate::config::Config;
use crate::error::StoreResult;
use crate::reference::RecipeRef;
use crate::ui::{self, UiContext};

/// Execute the outdated command
pub fn execute(args: OutdatedArgs, config: &Config) -> StoreResult<()> {
    let ctx = UiContext::detect();
    let store = open_store(config)?;
    let reference = RecipeRef::parse_partial(&args.reference)?;
    let outdated = store.outdated_packages(&reference)?;

    match args.format {
        OutputFormat::Json => {
            let rendered: Vec<String> = outdated.iter().map(ToString::to_string).collect();
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        OutputFormat::Plain => {
            for pref in &outdated {
                println!("{}", pref);
            }
        }
        OutputFormat::Table if outdated.is_empty() => {
            ui::step_info(&ctx, &format!("No outdated packages of {}", reference));
        }
        OutputFormat::Table => {
            ui::section(&ctx, &format!("Outdated packages of {}", reference));
            for pref in &outdated {
                ui::step_warn(&ctx, &pref.to_string());
            }
        }
    }

    if args.remove {
        for pref in &outdated {
            store.remove_package_revision(pref)?;
        }
        if !outdated.is_empty() {
            ui::step_ok(&ctx, &format!("Removed {} outdated package(s)", outdated.len()));
        }
    } else if !outdated.is_empty() && matches!(args.format, OutputFormat::Table) {
        ui::step_warn_hint(
            &ctx,
            &format!("{} outdated package(s)", outdated.len()),
            "Run with --remove to delete them",
        );
    }

    Ok(())
}
