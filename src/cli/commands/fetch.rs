//! Fetch command - download through the download cache

use crate::cli::args::FetchArgs;
use crate::config::{Config, ConfigManager};
use crate::download::{fetch_verified, DownloadCache, UreqFetcher};
use crate::error::StoreResult;
use crate::lock::LockManager;
use crate::ui::{TaskSpinner, UiContext};
use tracing::debug;

/// Execute the fetch command
pub fn execute(args: FetchArgs, config: &Config) -> StoreResult<()> {
    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Fetching {}", args.url));

    let result = if config.download_cache.enabled {
        let cache = DownloadCache::new(
            ConfigManager::download_path(config),
            LockManager::new(config.locks.options()),
        );
        cache
            .get_or_fetch(&args.url, args.sha256.as_deref(), &args.dest, &UreqFetcher)
            .map(|_| ())
    } else {
        debug!("Download cache disabled, fetching directly");
        fetch_verified(&args.url, args.sha256.as_deref(), &args.dest, &UreqFetcher)
    };

    match result {
        Ok(()) => {
            spinner.stop(&format!("Saved {}", args.dest.display()));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error(&format!("Fetch of {} failed", args.url));
            Err(e)
        }
    }
}
