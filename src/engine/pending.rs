// src/engine/pending.rs

use std::path::PathBuf;

/// At most one rerun is remembered while loading or running; any number of
/// triggers collapse into it.
#[derive(Debug, Default, Clone)]
pub struct PendingRerun {
    pending: bool,
    coalesced: usize,
    last_path: Option<PathBuf>,
}

impl PendingRerun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: Option<PathBuf>) {
        if self.pending {
            self.coalesced += 1;
        }
        self.pending = true;
        if path.is_some() {
            self.last_path = path;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Number of extra triggers folded into the pending rerun.
    pub fn coalesced(&self) -> usize {
        self.coalesced
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&mut self) -> bool {
        let was = self.pending;
        self.pending = false;
        self.coalesced = 0;
        self.last_path = None;
        was
    }

    pub fn last_path(&self) -> Option<&PathBuf> {
        self.last_path.as_ref()
    }
}
