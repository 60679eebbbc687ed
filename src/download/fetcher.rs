//! Transports that put a URL's content into a file

use crate::error::{StoreError, StoreResult};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::debug;

/// Writes the resource at `url` to `dest`
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str, dest: &Path) -> StoreResult<()>;
}

impl<F> Fetcher for F
where
    F: Fn(&str, &Path) -> StoreResult<()> + Send + Sync,
{
    fn fetch(&self, url: &str, dest: &Path) -> StoreResult<()> {
        self(url, dest)
    }
}

/// Blocking HTTP(S) GET through `ureq`
#[derive(Debug, Clone, Copy, Default)]
pub struct UreqFetcher;

impl Fetcher for UreqFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> StoreResult<()> {
        debug!("GET {}", url);
        let response = ureq::get(url).call().map_err(|e| StoreError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut file = File::create(dest)
            .map_err(|e| StoreError::io(format!("creating {}", dest.display()), e))?;
        let mut body = response.into_body().into_reader();
        io::copy(&mut body, &mut file).map_err(|e| StoreError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn closures_are_fetchers() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out");
        let fetcher = |url: &str, dest: &Path| {
            std::fs::write(dest, url).map_err(|e| StoreError::io("writing", e))
        };
        fetcher.fetch("https://h/a", &dest).unwrap();
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "https://h/a");
    }

    #[test]
    fn unreachable_host_is_a_fetch_error() {
        let dir = TempDir::new().unwrap();
        let err = UreqFetcher
            .fetch("http://127.0.0.1:9/nothing", &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Fetch { .. }));
    }
}
