// src/watch/hash.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// blake3 of a file's contents, hex encoded.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs.read_bytes(path)?;
    let mut hasher = Hasher::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last seen content hash per source file. Editors often emit several events
/// per save, or touch files without changing them; only real content
/// changes get through.
#[derive(Debug, Default)]
pub struct SourceHashes {
    /// `None` records a file known to be absent.
    hashes: HashMap<PathBuf, Option<String>>,
}

impl SourceHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record current hashes without reporting changes.
    pub fn prime<'a>(&mut self, fs: &dyn FileSystem, paths: impl IntoIterator<Item = &'a PathBuf>) {
        for path in paths {
            let hash = compute_file_hash(fs, path).ok();
            self.hashes.insert(path.clone(), hash);
        }
    }

    /// Re-hash `path`; true when its content (or existence) changed since
    /// the last observation. Unknown paths count as changed.
    pub fn observe(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        let current = if fs.is_file(path) {
            compute_file_hash(fs, path).ok()
        } else {
            None
        };

        let changed = match self.hashes.get(path) {
            Some(previous) => *previous != current,
            None => true,
        };
        debug!(path = ?path, changed, "observed source");
        self.hashes.insert(path.to_path_buf(), current);
        changed
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
