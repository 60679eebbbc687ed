//! CLI command implementations

pub mod completions;
pub mod config;
pub mod export;
pub mod fetch;
pub mod latest;
pub mod outdated;
pub mod path;
pub mod remove;
pub mod revisions;

pub use completions::execute as completions;
pub use config::execute as config;
pub use export::execute as export;
pub use fetch::execute as fetch;
pub use latest::execute as latest;
pub use outdated::execute as outdated;
pub use path::execute as path;
pub use remove::execute as remove;
pub use revisions::execute as revisions;

use crate::cache::LocalCache;
use crate::config::{Config, ConfigManager};
use crate::error::StoreResult;
use crate::lock::LockManager;

/// Open the local store described by `config`
pub(crate) fn open_store(config: &Config) -> StoreResult<LocalCache> {
    LocalCache::open(
        ConfigManager::store_path(config),
        LockManager::new(config.locks.options()),
        config.storage.case_check.enabled(),
    )
}
