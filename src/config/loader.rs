// src/config/loader.rs

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::model::{DefinitionFile, ServerSection};
use crate::config::modules::{CachedModule, ModuleCache};
use crate::config::validate::{check_include_graph, task_decl, validate_server_section};
use crate::errors::{PipelineError, Result};
use crate::fs::{normalize, FileSystem};
use crate::task::{BodyLibrary, RegistrySource, TaskRegistry};

/// Result of one load of the definition tree.
#[derive(Debug)]
pub struct LoadedPipeline {
    pub config: ServerSection,
    pub registry: TaskRegistry,
    /// Modules in registration order, prelude first.
    pub modules: Vec<PathBuf>,
}

/// Reads the definition tree rooted at an entry file and builds a fresh
/// registry from it.
///
/// Each load evicts every module read by the previous load (pinned prelude
/// modules excepted), re-reads the tree, rejects include cycles and then
/// registers tasks module by module: prelude modules first, then the tree in
/// post-order (includes before the file that includes them).
#[derive(Debug)]
pub struct DefinitionLoader {
    entry: PathBuf,
    fs: Arc<dyn FileSystem>,
    bodies: Arc<BodyLibrary>,
    modules: ModuleCache,
    prelude: Vec<PathBuf>,
}

impl DefinitionLoader {
    pub fn new(entry: impl AsRef<Path>, fs: Arc<dyn FileSystem>, bodies: Arc<BodyLibrary>) -> Self {
        Self {
            entry: normalize(entry.as_ref()),
            fs,
            bodies,
            modules: ModuleCache::new(),
            prelude: Vec::new(),
        }
    }

    /// Load prelude files (and their includes) once and pin them. They are
    /// never re-read, even if they change on disk.
    pub fn with_prelude(mut self, paths: &[PathBuf]) -> Result<Self> {
        for path in paths {
            let (order, _) = self.read_tree(&normalize(path))?;
            for module in order {
                if !self.prelude.contains(&module) {
                    self.prelude.push(module);
                }
            }
        }
        self.modules.pin_all();
        info!(modules = self.prelude.len(), "prelude pinned");
        Ok(self)
    }

    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Directory holding the entry file.
    pub fn root_dir(&self) -> PathBuf {
        match self.entry.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn modules(&self) -> &ModuleCache {
        &self.modules
    }

    /// Parse the entry file's `[config]` without building a registry.
    pub fn read_config(&self) -> Result<ServerSection> {
        let text = self.fs.read_to_string(&self.entry)?;
        let file: DefinitionFile = toml::from_str(&text)?;
        let section = file.config.unwrap_or_default();
        validate_server_section(&section)?;
        Ok(section)
    }

    pub fn load(&mut self) -> Result<LoadedPipeline> {
        self.modules.evict_since_last_load();

        let entry = self.entry.clone();
        let (tree, _) = self.read_tree(&entry)?;

        let entry_module = self
            .modules
            .get(&self.entry)
            .ok_or_else(|| PipelineError::ConfigError(format!("entry {} not loaded", self.entry.display())))?;
        let config = entry_module.file.config.clone().unwrap_or_default();
        validate_server_section(&config)?;

        let mut order: Vec<PathBuf> = self.prelude.clone();
        for module in tree {
            if !order.contains(&module) {
                order.push(module);
            }
        }

        let mut registry = TaskRegistry::new();
        for path in &order {
            let Some(module) = self.modules.get(path) else {
                continue;
            };
            for def in &module.file.task {
                registry.register(task_decl(def, &self.bodies, path)?)?;
            }
        }

        info!(
            entry = %self.entry.display(),
            modules = order.len(),
            tasks = registry.len(),
            "definitions loaded"
        );

        Ok(LoadedPipeline {
            config,
            registry,
            modules: order,
        })
    }

    /// Read `start` and everything it includes into the module cache, check
    /// the include graph for cycles, and return the modules in post-order.
    fn read_tree(&mut self, start: &Path) -> Result<(Vec<PathBuf>, Vec<(PathBuf, PathBuf)>)> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut files: Vec<PathBuf> = Vec::new();
        let mut edges: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::from([start.to_path_buf()]);

        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let includes = self.ensure_module(&path)?;
            for inc in includes {
                edges.push((path.clone(), inc.clone()));
                queue.push_back(inc);
            }
            files.push(path);
        }

        check_include_graph(&files, &edges)?;

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.post_order(start, &edges, &mut visited, &mut order);
        Ok((order, edges))
    }

    fn post_order(
        &self,
        path: &Path,
        edges: &[(PathBuf, PathBuf)],
        visited: &mut HashSet<PathBuf>,
        out: &mut Vec<PathBuf>,
    ) {
        if !visited.insert(path.to_path_buf()) {
            return;
        }
        for (_, inc) in edges.iter().filter(|(from, _)| from == path) {
            self.post_order(inc, edges, visited, out);
        }
        out.push(path.to_path_buf());
    }

    /// Parse `path` unless it is already cached; return its resolved
    /// includes.
    fn ensure_module(&mut self, path: &Path) -> Result<Vec<PathBuf>> {
        if let Some(module) = self.modules.get(path) {
            if module.pinned {
                debug!(path = %path.display(), "using pinned module");
            }
            return Ok(resolve_includes(path, &module.file));
        }

        let text = self.fs.read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read {}: {e:#}", path.display()))
        })?;
        let file: DefinitionFile = toml::from_str(&text).map_err(|e| {
            PipelineError::ConfigError(format!("{}: {e}", path.display()))
        })?;
        let includes = resolve_includes(path, &file);

        debug!(path = %path.display(), tasks = file.task.len(), includes = includes.len(), "read module");
        self.modules.insert(CachedModule {
            path: path.to_path_buf(),
            file,
            pinned: false,
        });
        Ok(includes)
    }
}

fn resolve_includes(path: &Path, file: &DefinitionFile) -> Vec<PathBuf> {
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    file.include
        .iter()
        .map(|inc| normalize(&base.join(inc)))
        .collect()
}

impl RegistrySource for DefinitionLoader {
    fn reload(&mut self) -> Result<TaskRegistry> {
        self.load().map(|loaded| loaded.registry)
    }

    fn script(&self) -> String {
        self.entry().display().to_string()
    }
}
