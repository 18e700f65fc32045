// src/config/modules.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::DefinitionFile;

#[derive(Debug, Clone)]
pub struct CachedModule {
    pub path: PathBuf,
    pub file: DefinitionFile,
    pub pinned: bool,
}

/// Parsed definition files, keyed by normalized path.
///
/// Modules loaded at process start (the prelude) are pinned and survive
/// every reload. Everything else is evicted before the next load so the tree
/// is re-read from scratch.
#[derive(Debug, Default, Clone)]
pub struct ModuleCache {
    modules: BTreeMap<PathBuf, CachedModule>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: CachedModule) {
        self.modules.insert(module.path.clone(), module);
    }

    pub fn get(&self, path: &Path) -> Option<&CachedModule> {
        self.modules.get(path)
    }

    pub fn is_pinned(&self, path: &Path) -> bool {
        self.modules.get(path).is_some_and(|m| m.pinned)
    }

    pub fn pin_all(&mut self) {
        for module in self.modules.values_mut() {
            module.pinned = true;
        }
    }

    /// Drop every module that is not pinned. Returns the evicted paths.
    pub fn evict_since_last_load(&mut self) -> Vec<PathBuf> {
        let evicted: Vec<PathBuf> = self
            .modules
            .values()
            .filter(|m| !m.pinned)
            .map(|m| m.path.clone())
            .collect();
        for path in &evicted {
            self.modules.remove(path);
            debug!(path = ?path, "evicted module for reload");
        }
        evicted
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.modules.keys()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
