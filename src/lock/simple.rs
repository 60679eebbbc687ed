//! Exclusive lock on a single file, across threads and processes

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

/// Paths currently held by threads of this process.
///
/// Owned by a `LockManager` and shared by its clones.
#[derive(Debug, Default)]
pub(crate) struct ThreadLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl ThreadLocks {
    fn acquire(self: &Arc<Self>, path: &Path) -> ThreadGuard {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        while held.contains(path) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|e| e.into_inner());
        }
        held.insert(path.to_path_buf());
        ThreadGuard {
            locks: Arc::clone(self),
            path: path.to_path_buf(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.held.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[derive(Debug)]
struct ThreadGuard {
    locks: Arc<ThreadLocks>,
    path: PathBuf,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.path);
        self.locks.released.notify_all();
    }
}

/// Held exclusive lock: an in-process guard plus an OS lock on the file.
///
/// Dropping it closes the file (releasing the OS lock) before waking
/// waiting threads.
#[derive(Debug)]
pub struct SimpleLock {
    file: File,
    guard: ThreadGuard,
}

impl SimpleLock {
    pub(crate) fn acquire(locks: &Arc<ThreadLocks>, path: &Path) -> StoreResult<Self> {
        let thread = locks.acquire(path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::io(format!("creating lock directory {}", parent.display()), e)
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(format!("opening lock file {}", path.display()), e))?;
        file.lock_exclusive()
            .map_err(|e| StoreError::io(format!("locking {}", path.display()), e))?;

        Ok(Self {
            file,
            guard: thread,
        })
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.guard.path
    }
}

impl Drop for SimpleLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn creates_lock_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let locks = Arc::new(ThreadLocks::default());
        let path = dir.path().join("a/b/key.lock");

        let lock = SimpleLock::acquire(&locks, &path).unwrap();
        assert!(path.exists());
        assert_eq!(lock.path(), path);
        assert_eq!(locks.len(), 1);
        drop(lock);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn serializes_threads() {
        let dir = TempDir::new().unwrap();
        let locks = Arc::new(ThreadLocks::default());
        let path = dir.path().join("key.lock");
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let path = path.clone();
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _lock = SimpleLock::acquire(&locks, &path).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
