//! Path command - show the folders of a revision

use super::open_store;
use crate::cli::args::RefArgs;
use crate::config::Config;
use crate::error::StoreResult;
use crate::lock::LockMode;
use crate::reference::AnyRef;
use crate::ui::{self, UiContext};

/// Execute the path command
///
/// Folders are looked up under a read lock, so a dirty entry is reported
/// as corrupted instead of being shown.
pub fn execute(args: RefArgs, config: &Config) -> StoreResult<()> {
    let ctx = UiContext::detect();
    let store = open_store(config)?;

    match AnyRef::parse(&args.reference)? {
        AnyRef::Recipe(recipe) => store.with_lock(&recipe, LockMode::Read, |layout| {
            ui::section(&ctx, &layout.reference.to_string());
            ui::key_value(&ctx, "base", &layout.base.display().to_string());
            ui::key_value(&ctx, "export", &layout.export.display().to_string());
            ui::key_value(
                &ctx,
                "export_sources",
                &layout.export_sources.display().to_string(),
            );
            ui::key_value(&ctx, "source", &layout.source.display().to_string());
            ui::key_value(&ctx, "system_reqs", &layout.system_reqs.display().to_string());
            Ok(())
        }),
        AnyRef::Package(pref) => store.with_package_lock(&pref, LockMode::Read, |layout| {
            ui::section(&ctx, &layout.reference.to_string());
            ui::key_value(&ctx, "package", &layout.package.display().to_string());
            ui::key_value(&ctx, "build", &layout.build.display().to_string());
            ui::key_value(&ctx, "system_reqs", &layout.system_reqs.display().to_string());
            Ok(())
        }),
    }
}
