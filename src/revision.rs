//! Content-derived revision ids
//!
//! A revision id is the SHA-256 of a folder's manifest (sorted relative paths
//! and file digests), truncated to 32 hex characters. Identical content always
//! yields the same id; any change yields a new one.

use crate::error::{StoreError, StoreResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Hex characters kept from the manifest digest
pub const REVISION_LEN: usize = 32;

/// SHA-256 of a file's contents, hex encoded
pub fn file_sha256(path: &Path) -> StoreResult<String> {
    let mut file = File::open(path)
        .map_err(|e| StoreError::io(format!("opening {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| StoreError::io(format!("hashing {}", path.display()), e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Revision id for the files under `folder`
pub fn folder_revision(folder: &Path) -> StoreResult<String> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let context = format!("walking {}", folder.display());
            StoreError::io(context, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(folder)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        entries.push((relative, file_sha256(entry.path())?));
    }

    let mut hasher = Sha256::new();
    for (relative, digest) in &entries {
        hasher.update(relative.as_bytes());
        hasher.update(b": ");
        hasher.update(digest.as_bytes());
        hasher.update(b"\n");
    }
    let mut revision = hex::encode(hasher.finalize());
    revision.truncate(REVISION_LEN);
    Ok(revision)
}
