//! Export command - store a folder as a recipe revision

use super::open_store;
use crate::cli::args::ExportArgs;
use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::reference::RecipeRef;
use crate::ui::{self, UiContext};

/// Execute the export command
pub fn execute(args: ExportArgs, config: &Config) -> StoreResult<()> {
    let ctx = UiContext::detect();
    let reference = RecipeRef::parse_partial(&args.reference)?;
    if reference.revision().is_some() {
        return Err(StoreError::User(format!(
            "{} already names a revision; exported revisions are derived from content",
            reference
        )));
    }
    if !args.folder.is_dir() {
        return Err(StoreError::User(format!(
            "Not a directory: {}",
            args.folder.display()
        )));
    }

    let store = open_store(config)?;
    let pinned = store.export_recipe(&reference, &args.folder)?;
    ui::step_ok_detail(&ctx, "Exported", &pinned.to_string());
    Ok(())
}
