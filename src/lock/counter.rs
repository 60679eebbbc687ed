//! Signed-pid counter file backing the reader/writer lock
//!
//! For a guarded folder `F`, `F.count` holds a comma-separated list of signed
//! process ids: positive entries are readers, negative entries are writers.
//! The file is only read or written while `F.count.lock` is held.

use super::sibling_path;
use crate::error::{StoreError, StoreResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Access mode for a counted lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

impl LockMode {
    /// Entry recorded in the counter for `pid` in this mode
    pub fn signed(self, pid: u32) -> i64 {
        match self {
            Self::Read => i64::from(pid),
            Self::Write => -i64::from(pid),
        }
    }

    /// Whether a new holder in this mode is compatible with `entries`
    pub fn can_acquire(self, entries: &[i64]) -> bool {
        let writers = entries.iter().filter(|e| **e < 0).count();
        let readers = entries.iter().filter(|e| **e > 0).count();
        match self {
            Self::Read => writers == 0,
            Self::Write => writers == 0 && readers == 0,
        }
    }
}

/// Counter file and its mutex file for one guarded folder
#[derive(Debug, Clone)]
pub struct LockCounter {
    count_path: PathBuf,
    mutex_path: PathBuf,
}

impl LockCounter {
    pub fn for_folder(folder: &Path) -> Self {
        let count_path = sibling_path(folder, ".count");
        let mutex_path = sibling_path(&count_path, ".lock");
        Self {
            count_path,
            mutex_path,
        }
    }

    pub fn count_path(&self) -> &Path {
        &self.count_path
    }

    pub fn mutex_path(&self) -> &Path {
        &self.mutex_path
    }

    /// Current entries; a missing file means no holders
    pub fn read(&self) -> StoreResult<Vec<i64>> {
        match fs::read_to_string(&self.count_path) {
            Ok(content) => Ok(parse_entries(&content, &self.count_path)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(
                format!("reading lock counter {}", self.count_path.display()),
                e,
            )),
        }
    }

    /// Replace the entries; an empty list removes the file
    pub fn write(&self, entries: &[i64]) -> StoreResult<()> {
        if entries.is_empty() {
            return match fs::remove_file(&self.count_path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StoreError::io(
                    format!("removing lock counter {}", self.count_path.display()),
                    e,
                )),
            };
        }

        if let Some(parent) = self.count_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::io(format!("creating lock directory {}", parent.display()), e)
            })?;
        }
        let content = entries
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        fs::write(&self.count_path, content).map_err(|e| {
            StoreError::io(
                format!("writing lock counter {}", self.count_path.display()),
                e,
            )
        })
    }
}

fn parse_entries(content: &str, path: &Path) -> Vec<i64> {
    content
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<i64>() {
            Ok(0) | Err(_) => {
                warn!(
                    "Dropping unreadable entry '{}' from lock counter {}",
                    token,
                    path.display()
                );
                None
            }
            Ok(entry) => Some(entry),
        })
        .collect()
}
