//! Dirty markers for cache entries being written
//!
//! `<entry>.dirty` exists from the moment a write into the entry starts until
//! it fully succeeds. An entry that still has its marker was interrupted and
//! must be deleted and fetched again; it is never read.

use crate::error::{StoreError, StoreResult};
use crate::lock::sibling_path;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DIRTY_SUFFIX: &str = ".dirty";

/// Marker file for `folder`
pub fn marker_path(folder: &Path) -> PathBuf {
    sibling_path(folder, DIRTY_SUFFIX)
}

pub fn is_dirty(folder: &Path) -> bool {
    marker_path(folder).exists()
}

pub fn set_dirty(folder: &Path) -> StoreResult<()> {
    let marker = marker_path(folder);
    if let Some(parent) = marker.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::io(format!("creating {}", parent.display()), e))?;
    }
    fs::write(&marker, b"")
        .map_err(|e| StoreError::io(format!("writing dirty marker {}", marker.display()), e))
}

pub fn clear_dirty(folder: &Path) -> StoreResult<()> {
    let marker = marker_path(folder);
    match fs::remove_file(&marker) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(
            format!("removing dirty marker {}", marker.display()),
            e,
        )),
    }
}

/// `Corrupted` if `folder` carries a dirty marker
pub fn ensure_clean(folder: &Path) -> StoreResult<()> {
    if is_dirty(folder) {
        return Err(StoreError::Corrupted {
            path: folder.to_path_buf(),
        });
    }
    Ok(())
}

/// Run `f` with `folder` marked dirty; the marker is cleared only if `f`
/// succeeds.
pub fn with_dirty_marker<T>(folder: &Path, f: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
    set_dirty(folder)?;
    match f() {
        Ok(value) => {
            clear_dirty(folder)?;
            Ok(value)
        }
        Err(e) => {
            warn!("Write into {} failed, entry left dirty: {}", folder.display(), e);
            Err(e)
        }
    }
}
