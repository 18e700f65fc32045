// src/exec/cache.rs

//! Per-(task, node) result cache.
//!
//! Keys pair a task identity (name, resolved order, params) with a node
//! fingerprint (blake3 of the node's canonical JSON; ids are not part of
//! it). Entries carry a checksum of their outcome so a damaged file entry is
//! detected and treated as a miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{PipelineError, Result};
use crate::fs::FileSystem;
use crate::scene::Node;
use crate::task::TaskSpec;
use crate::types::CacheStorageMode;

/// Cache directory, relative to the pipeline root.
pub const CACHE_DIR: &str = ".scenepipe/cache";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub task: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(task_identity: String, fingerprint: String) -> Self {
        Self {
            task: task_identity,
            fingerprint,
        }
    }

    /// Stable digest used as the on-disk file name.
    pub fn digest(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.task.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.fingerprint.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

pub fn task_identity(spec: &TaskSpec) -> String {
    let mut hasher = Hasher::new();
    hasher.update(spec.name().as_bytes());
    hasher.update(b"\0");
    hasher.update(spec.order().to_string().as_bytes());
    hasher.update(b"\0");
    // Attributes serialize with sorted keys.
    if let Ok(params) = serde_json::to_vec(spec.params()) {
        hasher.update(&params);
    }
    hasher.finalize().to_hex().to_string()
}

pub fn node_fingerprint(node: &Node) -> Result<String> {
    let json = serde_json::to_vec(node)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// Outcome as stored; `Keep` remembers the node state after the body ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "node", rename_all = "lowercase")]
pub enum CachedOutcome {
    Keep(Node),
    Remove,
    Replace(Node),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub task: String,
    pub fingerprint: String,
    pub outcome: CachedOutcome,
    pub checksum: String,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, outcome: CachedOutcome) -> Result<Self> {
        let checksum = outcome_checksum(&outcome)?;
        Ok(Self {
            task: key.task.clone(),
            fingerprint: key.fingerprint.clone(),
            outcome,
            checksum,
        })
    }

    pub fn verify(&self, key: &CacheKey) -> Result<()> {
        if self.task != key.task || self.fingerprint != key.fingerprint {
            return Err(PipelineError::CacheCorruption(format!(
                "entry {} does not belong to its key",
                key.digest()
            )));
        }
        if outcome_checksum(&self.outcome)? != self.checksum {
            return Err(PipelineError::CacheCorruption(format!(
                "checksum mismatch for entry {}",
                key.digest()
            )));
        }
        Ok(())
    }
}

fn outcome_checksum(outcome: &CachedOutcome) -> Result<String> {
    let json = serde_json::to_vec(outcome)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// Abstract storage for cache entries.
pub trait CacheStore: Send {
    /// `Ok(None)` is a miss; an error means the stored entry is unusable.
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;
    fn save(&mut self, key: &CacheKey, entry: CacheEntry) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    map: HashMap<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.map.get(key).cloned())
    }

    fn save(&mut self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        self.map.insert(key.clone(), entry);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if !self.map.is_empty() {
            debug!(removed = self.map.len(), "cleared cache (memory)");
        }
        self.map.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// JSON files under `<root>/.scenepipe/cache/<digest>.json`.
#[derive(Debug)]
pub struct FileCacheStore {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileCacheStore {
    pub fn new(root: &Path, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            dir: root.join(CACHE_DIR),
            fs,
        }
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        if !self.fs.exists(&self.dir) {
            return Vec::new();
        }
        match self.fs.read_dir(&self.dir) {
            Ok(entries) => entries
                .into_iter()
                .filter(|p| p.extension().is_some_and(|e| e == "json"))
                .collect(),
            Err(err) => {
                warn!(dir = ?self.dir, error = %err, "cannot list cache directory");
                Vec::new()
            }
        }
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        if !self.fs.is_file(&path) {
            return Ok(None);
        }
        let text = self.fs.read_to_string(&path)?;
        let entry: CacheEntry = serde_json::from_str(&text).map_err(|e| {
            PipelineError::CacheCorruption(format!("unreadable entry {:?}: {e}", path))
        })?;
        entry.verify(key)?;
        Ok(Some(entry))
    }

    fn save(&mut self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        let json = serde_json::to_vec(&entry)?;
        self.fs.write(&self.entry_path(key), &json)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let files = self.entry_files();
        for path in &files {
            self.fs.remove_file(path)?;
        }
        if !files.is_empty() {
            debug!(removed = files.len(), dir = ?self.dir, "cleared cache (file)");
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entry_files().len()
    }
}

pub fn build_store(
    mode: CacheStorageMode,
    root: &Path,
    fs: Arc<dyn FileSystem>,
) -> Box<dyn CacheStore> {
    match mode {
        CacheStorageMode::Memory => Box::new(MemoryCacheStore::new()),
        CacheStorageMode::File => Box::new(FileCacheStore::new(root, fs)),
    }
}
