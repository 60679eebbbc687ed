//! Download cache shared by every store on the machine
//!
//! Blobs are keyed by URL and checksum, so the same file requested through
//! differently signed URLs is fetched once. A per-key `SimpleLock` makes
//! concurrent requests for one key wait for a single fetch, across threads
//! and processes alike.

mod fetcher;

pub use fetcher::{Fetcher, UreqFetcher};

use crate::error::{StoreError, StoreResult};
use crate::lock::LockManager;
use crate::revision::file_sha256;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Query parameters that change between signings of the same resource
const VOLATILE_PARAMS: &[&str] = &["signature", "sig", "expires", "awsaccesskeyid", "token"];

/// `url` without its fragment and volatile query parameters
pub fn strip_volatile(url: &str) -> String {
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| {
            let key = param.split('=').next().unwrap_or_default().to_ascii_lowercase();
            !key.is_empty()
                && !key.starts_with("x-amz-")
                && !VOLATILE_PARAMS.contains(&key.as_str())
        })
        .collect();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, kept.join("&"))
    }
}

/// Cache key for a URL and optional checksum
pub fn cache_key(url: &str, checksum: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(strip_volatile(url).as_bytes());
    hasher.update(b"\n");
    hasher.update(checksum.unwrap_or_default().to_ascii_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Fetch `url` into `dest` and check its SHA-256 against `checksum`.
///
/// On any failure `dest` is removed.
pub fn fetch_verified(
    url: &str,
    checksum: Option<&str>,
    dest: &Path,
    fetcher: &impl Fetcher,
) -> StoreResult<()> {
    let result = fetcher.fetch(url, dest).and_then(|()| match checksum {
        Some(expected) => {
            let actual = file_sha256(dest)?;
            if actual.eq_ignore_ascii_case(expected) {
                Ok(())
            } else {
                Err(StoreError::ChecksumMismatch {
                    url: url.to_string(),
                    expected: expected.to_string(),
                    actual,
                })
            }
        }
        None => Ok(()),
    });

    if result.is_err() {
        let _ = fs::remove_file(dest);
    }
    result
}

/// Folder of downloaded blobs, one file per cache key
#[derive(Debug, Clone)]
pub struct DownloadCache {
    root: PathBuf,
    locks: LockManager,
}

impl DownloadCache {
    pub fn new(root: impl Into<PathBuf>, locks: LockManager) -> Self {
        Self {
            root: root.into(),
            locks,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the blob for `key` lives
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Copy the cached blob for (`url`, `checksum`) to `dest`, fetching it
    /// first on a miss. Returns `dest`.
    pub fn get_or_fetch(
        &self,
        url: &str,
        checksum: Option<&str>,
        dest: &Path,
        fetcher: &impl Fetcher,
    ) -> StoreResult<PathBuf> {
        let key = cache_key(url, checksum);
        let blob = self.blob_path(&key);
        let _lock = self.locks.simple(&blob)?;

        if blob.is_file() {
            debug!("Download cache hit for {} ({})", url, key);
        } else {
            let temp = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
            fetch_verified(url, checksum, &temp, fetcher)?;
            fs::rename(&temp, &blob).map_err(|e| {
                let _ = fs::remove_file(&temp);
                StoreError::io(format!("storing download {}", blob.display()), e)
            })?;
            info!("Downloaded {}", url);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::copy(&blob, dest)
            .map_err(|e| StoreError::io(format!("copying download to {}", dest.display()), e))?;
        Ok(dest.to_path_buf())
    }

    /// Remove every cached blob; returns how many were removed.
    ///
    /// Each blob is removed under its key lock, so an in-flight
    /// `get_or_fetch` finishes first. Temporary fetch files are left alone.
    pub fn clear(&self) -> StoreResult<usize> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(StoreError::io(
                    format!("listing {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut blobs = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| StoreError::io(format!("listing {}", self.root.display()), e))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !path.is_file() || name.starts_with('.') || name.ends_with(".lock") {
                continue;
            }
            blobs.push(path);
        }

        let mut removed = 0;
        for blob in blobs {
            let _lock = self.locks.simple(&blob)?;
            match fs::remove_file(&blob) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::io(format!("removing {}", blob.display()), e))
                }
            }
        }
        info!("Cleared {} cached downloads", removed);
        Ok(removed)
    }
}
