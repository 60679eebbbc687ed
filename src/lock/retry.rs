//! Fixed-delay polling

use std::thread;
use std::time::Duration;

/// Re-run an attempt with a fixed sleep between tries.
///
/// Unbounded unless `max_attempts` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl Retry {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Call `attempt` until it yields `Some`, fails, or attempts run out
    /// (`Ok(None)`).
    pub fn run<T, E>(
        &self,
        mut attempt: impl FnMut() -> Result<Option<T>, E>,
    ) -> Result<Option<T>, E> {
        let mut tries = 0u32;
        loop {
            tries = tries.saturating_add(1);
            if let Some(value) = attempt()? {
                return Ok(Some(value));
            }
            if self.max_attempts.is_some_and(|max| tries >= max) {
                return Ok(None);
            }
            thread::sleep(self.delay);
        }
    }
}
