//! Cross-process reader/writer locks for cache folders
//!
//! Any number of readers or exactly one writer may hold a folder, enforced
//! between independent processes through files only:
//!
//! | File | Content | Held for |
//! |------|---------|----------|
//! | `F.count` | signed pids, `+` reader / `-` writer | whole critical section |
//! | `F.count.lock` | empty, OS-locked | read-decide-write of `F.count` |
//!
//! Entries of processes that no longer exist are pruned by the next
//! acquirer of the same folder. There is no timeout: a live holder is
//! never preempted.

mod counter;
mod liveness;
mod retry;
mod simple;

pub use counter::{LockCounter, LockMode};
pub use liveness::{OsLiveness, ProcessLiveness, StaticLiveness};
pub use retry::Retry;
pub use simple::SimpleLock;

use crate::error::{StoreError, StoreResult};
use simple::ThreadLocks;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay between read acquisition attempts
pub const READ_BUSY_DELAY: Duration = Duration::from_millis(500);

/// Delay between write acquisition attempts
pub const WRITE_BUSY_DELAY: Duration = Duration::from_millis(250);

/// `path` with `suffix` appended to its final component
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Tunables for a `LockManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// When false every acquisition returns `StoreLock::NoLock`
    pub enabled: bool,
    pub read_delay: Duration,
    pub write_delay: Duration,
    /// Give up with `LockBusy` after this many attempts (unbounded if `None`)
    pub max_attempts: Option<u32>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            read_delay: READ_BUSY_DELAY,
            write_delay: WRITE_BUSY_DELAY,
            max_attempts: None,
        }
    }
}

/// Snapshot of the holders recorded for a folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockHolders {
    pub readers: Vec<u32>,
    pub writers: Vec<u32>,
}

/// Hands out folder locks.
///
/// Clones share the in-process registry, so one manager built at startup and
/// passed around serializes threads as well as processes.
#[derive(Debug, Clone)]
pub struct LockManager {
    options: LockOptions,
    liveness: Arc<dyn ProcessLiveness>,
    threads: Arc<ThreadLocks>,
    pid: u32,
}

impl LockManager {
    /// Manager using OS liveness and the current process id
    pub fn new(options: LockOptions) -> Self {
        Self {
            options,
            liveness: Arc::new(OsLiveness),
            threads: Arc::new(ThreadLocks::default()),
            pid: std::process::id(),
        }
    }

    /// Manager whose folder locks are all no-ops
    pub fn no_lock() -> Self {
        Self::new(LockOptions {
            enabled: false,
            ..LockOptions::default()
        })
    }

    /// Replace the liveness check
    pub fn with_liveness(mut self, liveness: Arc<dyn ProcessLiveness>) -> Self {
        self.liveness = liveness;
        self
    }

    /// Bound the number of acquisition attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.options.max_attempts = Some(max_attempts);
        self
    }

    /// Handle recording a different pid, sharing this manager's registry
    pub fn with_pid(&self, pid: u32) -> Self {
        Self {
            pid,
            ..self.clone()
        }
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until `folder` is held in `mode`.
    pub fn acquire(&self, folder: &Path, mode: LockMode) -> StoreResult<StoreLock> {
        if !self.options.enabled {
            return Ok(StoreLock::NoLock);
        }

        let counter = LockCounter::for_folder(folder);
        let entry = mode.signed(self.pid);
        let delay = match mode {
            LockMode::Read => self.options.read_delay,
            LockMode::Write => self.options.write_delay,
        };

        let mut waiting_noted = false;
        let acquired = Retry::new(delay)
            .max_attempts(self.options.max_attempts)
            .run(|| -> StoreResult<Option<()>> {
                let _section = SimpleLock::acquire(&self.threads, counter.mutex_path())?;
                let mut entries = counter.read()?;
                let pruned = self.prune_stale(folder, &mut entries);

                if mode.can_acquire(&entries) {
                    entries.push(entry);
                    counter.write(&entries)?;
                    return Ok(Some(()));
                }

                if pruned {
                    counter.write(&entries)?;
                }
                if !waiting_noted {
                    info!(
                        "Waiting for {:?} lock on {} (held by {:?})",
                        mode,
                        folder.display(),
                        entries
                    );
                    waiting_noted = true;
                }
                Ok(None)
            })?;

        if acquired.is_none() {
            return Err(StoreError::LockBusy {
                path: folder.to_path_buf(),
                attempts: self.options.max_attempts.unwrap_or(0),
            });
        }

        debug!("Acquired {:?} lock on {}", mode, folder.display());
        let held = CountedLock {
            manager: self.clone(),
            counter,
            folder: folder.to_path_buf(),
            entry,
        };
        Ok(match mode {
            LockMode::Read => StoreLock::Read(held),
            LockMode::Write => StoreLock::Write(held),
        })
    }

    /// Exclusive lock on `<path>.lock`, independent of the counted protocol.
    ///
    /// Always real, even when folder locks are disabled.
    pub fn simple(&self, path: &Path) -> StoreResult<StoreLock> {
        let lock = SimpleLock::acquire(&self.threads, &sibling_path(path, ".lock"))?;
        Ok(StoreLock::Simple(lock))
    }

    /// Run `f` while holding `folder` in `mode`
    pub fn with_lock<T>(
        &self,
        folder: &Path,
        mode: LockMode,
        f: impl FnOnce() -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _lock = self.acquire(folder, mode)?;
        f()
    }

    /// Holders currently recorded for `folder` (stale entries included)
    pub fn holders(&self, folder: &Path) -> StoreResult<LockHolders> {
        let counter = LockCounter::for_folder(folder);
        let _section = SimpleLock::acquire(&self.threads, counter.mutex_path())?;
        let entries = counter.read()?;
        Ok(LockHolders {
            readers: entries
                .iter()
                .filter(|e| **e > 0)
                .map(|e| e.unsigned_abs() as u32)
                .collect(),
            writers: entries
                .iter()
                .filter(|e| **e < 0)
                .map(|e| e.unsigned_abs() as u32)
                .collect(),
        })
    }

    /// Drop entries whose process is gone. Returns whether any were removed.
    fn prune_stale(&self, folder: &Path, entries: &mut Vec<i64>) -> bool {
        let before = entries.len();
        entries.retain(|entry| {
            let alive = u32::try_from(entry.unsigned_abs())
                .map(|pid| self.liveness.is_alive(pid))
                .unwrap_or(false);
            if !alive {
                warn!(
                    "Removing stale lock entry {} on {} (process no longer exists)",
                    entry,
                    folder.display()
                );
            }
            alive
        });
        entries.len() != before
    }
}

/// Reader or writer entry recorded in a folder's counter, removed on drop
#[derive(Debug)]
pub struct CountedLock {
    manager: LockManager,
    counter: LockCounter,
    folder: PathBuf,
    entry: i64,
}

impl CountedLock {
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn release(&self) -> StoreResult<()> {
        let _section = SimpleLock::acquire(&self.manager.threads, self.counter.mutex_path())?;
        let mut entries = self.counter.read()?;
        if let Some(pos) = entries.iter().position(|e| *e == self.entry) {
            entries.remove(pos);
        }
        self.counter.write(&entries)
    }
}

impl Drop for CountedLock {
    fn drop(&mut self) {
        match self.release() {
            Ok(()) => debug!("Released lock on {}", self.folder.display()),
            Err(e) => warn!("Failed to release lock on {}: {}", self.folder.display(), e),
        }
    }
}

/// A held lock of any kind; released when dropped.
#[derive(Debug)]
pub enum StoreLock {
    /// Locking disabled
    NoLock,
    Read(CountedLock),
    Write(CountedLock),
    Simple(SimpleLock),
}

impl StoreLock {
    /// Counted mode, if this is a reader or writer lock
    pub fn mode(&self) -> Option<LockMode> {
        match self {
            Self::Read(_) => Some(LockMode::Read),
            Self::Write(_) => Some(LockMode::Write),
            Self::NoLock | Self::Simple(_) => None,
        }
    }

    /// Whether anything is actually held
    pub fn is_held(&self) -> bool {
        !matches!(self, Self::NoLock)
    }
}
