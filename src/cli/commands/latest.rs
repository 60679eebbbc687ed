//! Latest command - pin a reference to its latest revision

use super::open_store;
use crate::cli::args::RefArgs;
use crate::config::Config;
use crate::error::StoreResult;
use crate::reference::AnyRef;

/// Execute the latest command
pub fn execute(args: RefArgs, config: &Config) -> StoreResult<()> {
    let store = open_store(config)?;
    let resolved = match AnyRef::parse(&args.reference)? {
        AnyRef::Recipe(recipe) => store.resolve_latest(&recipe)?.to_string(),
        AnyRef::Package(pref) => store.resolve_latest_package(&pref)?.to_string(),
    };
    println!("{}", resolved);
    Ok(())
}
