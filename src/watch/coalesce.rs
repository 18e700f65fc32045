// src/watch/coalesce.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Trailing-edge debounce over changed paths.
///
/// Every push moves the deadline to `now + window`; once the deadline has
/// passed, the whole batch is released at once.
#[derive(Debug)]
pub struct Coalescer {
    window: Duration,
    pending: BTreeSet<PathBuf>,
    deadline: Option<Instant>,
}

impl Coalescer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeSet::new(),
            deadline: None,
        }
    }

    pub fn push(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path);
        self.deadline = Some(now + self.window);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The batch, if the window has elapsed. Paths come out sorted.
    pub fn ready(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(std::mem::take(&mut self.pending).into_iter().collect())
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
