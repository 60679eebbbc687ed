//! Process liveness checks used to reclaim entries left by crashed holders

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

/// Answers whether a process id still refers to a running process
pub trait ProcessLiveness: Send + Sync + fmt::Debug {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Liveness backed by the operating system (`kill(pid, 0)`)
#[derive(Debug, Default, Clone, Copy)]
pub struct OsLiveness;

impl ProcessLiveness for OsLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        // pid 0 and negative pids address process groups
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }

        // SAFETY: signal 0 performs only the existence and permission check
        let rc = unsafe { libc::kill(pid, 0) };
        if rc == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to someone else
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

/// Deterministic liveness: every pid is alive unless explicitly marked dead
#[derive(Debug, Default)]
pub struct StaticLiveness {
    dead: Mutex<HashSet<u32>>,
}

impl StaticLiveness {
    /// All pids alive
    pub fn all_alive() -> Self {
        Self::default()
    }

    /// All pids alive except `dead`
    pub fn with_dead(dead: impl IntoIterator<Item = u32>) -> Self {
        Self {
            dead: Mutex::new(dead.into_iter().collect()),
        }
    }

    /// Mark `pid` as exited
    pub fn kill(&self, pid: u32) {
        self.dead
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(pid);
    }
}

impl ProcessLiveness for StaticLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        !self
            .dead
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&pid)
    }
}
