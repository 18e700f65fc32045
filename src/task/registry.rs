// src/task/registry.rs

use std::collections::HashSet;

use tracing::debug;

use crate::errors::{PipelineError, Result};
use crate::order::{OrderKey, WildcardResolver};
use crate::task::body::Need;
use crate::task::spec::{TaskDecl, TaskSpec};

/// All tasks of one pipeline generation.
///
/// Registration validates each declaration and resolves its order key.
/// After loading, the registry is only read.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    tasks: Vec<TaskSpec>,
    resolver: WildcardResolver,
    last_order: Option<OrderKey>,
    names: HashSet<String>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Returns its resolved order key.
    ///
    /// A task without an order inherits the previous task's declared order
    /// with the last segment turned into a wildcard, so it runs right after
    /// its predecessor.
    pub fn register(&mut self, decl: TaskDecl) -> Result<OrderKey> {
        let name = decl.name.clone();
        if name.trim().is_empty() {
            return Err(PipelineError::ConfigError("task name must not be empty".into()));
        }
        if self.names.contains(&name) {
            return Err(PipelineError::ConfigError(format!(
                "task '{name}' is registered twice"
            )));
        }
        if decl.recurse && decl.path.is_none() {
            return Err(PipelineError::ConfigError(format!(
                "task '{name}': recurse requires a path"
            )));
        }

        let per_node = decl.path.is_some() || decl.select.is_some() || decl.filter.is_some();
        if decl.body.needs().contains(&Need::Node) && !per_node {
            return Err(PipelineError::ConfigError(format!(
                "task '{name}' needs a node but declares no path, selector or filter"
            )));
        }
        if decl.cache && decl.body.needs().contains(&Need::Root) {
            return Err(PipelineError::ConfigError(format!(
                "task '{name}' needs the root graph and cannot be cached; \
                 only the node's own state is replayed on a hit"
            )));
        }
        if decl.cache_override && !decl.cache {
            debug!(task = %name, "cache_override without cache has no effect");
        }

        let declared = match (&decl.order, &self.last_order) {
            (Some(order), _) => order.clone(),
            (None, Some(prev)) => prev.with_last_wildcard(),
            (None, None) => OrderKey::wildcard(),
        };
        let resolved = self.resolver.resolve(&declared)?;

        debug!(task = %name, declared = %declared, order = %resolved, "registered task");

        let seq = self.tasks.len();
        self.last_order = Some(declared.clone());
        self.names.insert(name);
        self.tasks
            .push(TaskSpec::new(decl, declared, resolved.clone(), seq));

        Ok(resolved)
    }

    /// Tasks in execution order: by resolved order key, ties broken by
    /// registration sequence.
    pub fn tasks_sorted(&self) -> Vec<&TaskSpec> {
        let mut sorted: Vec<&TaskSpec> = self.tasks.iter().collect();
        sorted.sort_by(|a, b| a.order().cmp(b.order()).then(a.seq().cmp(&b.seq())));
        sorted
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name() == name)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(TaskSpec::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Something that can (re)build a registry from scratch.
///
/// The definition loader is the production source; tests use static ones.
pub trait RegistrySource: Send {
    fn reload(&mut self) -> Result<TaskRegistry>;

    /// Human-readable name of what is being loaded (usually the entry file).
    fn script(&self) -> String;
}
