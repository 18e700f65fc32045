// src/fs/mock.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::{normalize, FileSystem};

/// In-memory filesystem. Directories exist implicitly whenever a file lives
/// below them. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.lock().insert(normalize(path.as_ref()), content.into());
    }

    /// Paths of all stored files, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = normalize(path);
        self.lock().keys().any(|p| p.starts_with(&dir) && *p != dir)
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("invalid UTF-8 in {:?}: {}", path, e))
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.lock()
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| anyhow!("file not found: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.lock()
            .remove(&normalize(path))
            .map(|_| ())
            .ok_or_else(|| anyhow!("file not found: {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock().contains_key(&normalize(path))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        if self.exists(path) {
            Ok(normalize(path))
        } else {
            Err(anyhow!("no such path: {:?}", path))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let dir = normalize(path);
        let mut entries: Vec<PathBuf> = self
            .lock()
            .keys()
            .filter_map(|p| {
                let rest = p.strip_prefix(&dir).ok()?;
                let first = rest.components().next()?;
                Some(dir.join(first.as_os_str()))
            })
            .collect();
        entries.dedup();
        if entries.is_empty() && !self.is_dir(&dir) {
            return Err(anyhow!("not a directory or not found: {:?}", path));
        }
        Ok(entries)
    }
}
