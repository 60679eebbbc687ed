//! Remove command - delete revisions from the store

use super::open_store;
use crate::cli::args::RemoveArgs;
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::reference::AnyRef;
use crate::ui::{self, UiContext};

/// Execute the remove command
pub fn execute(args: RemoveArgs, config: &Config) -> StoreResult<()> {
    let ctx = UiContext::detect();
    let store = open_store(config)?;

    match AnyRef::parse(&args.reference)? {
        AnyRef::Recipe(recipe) if args.all => {
            let removed = store.remove_recipe(&recipe)?;
            ui::step_ok(
                &ctx,
                &format!("Removed {} revision(s) of {}", removed, recipe.without_revision()),
            );
        }
        AnyRef::Recipe(recipe) => {
            store.remove_revision(&recipe)?;
            ui::step_ok(&ctx, &format!("Removed {}", recipe));
        }
        AnyRef::Package(_) if args.all => {
            return Err(StoreError::User(
                "--all applies to recipe references only".to_string(),
            ));
        }
        AnyRef::Package(pref) => {
            store.remove_package_revision(&pref)?;
            ui::step_ok(&ctx, &format!("Removed {}", pref));
        }
    }

    Ok(())
}
