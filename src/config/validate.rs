// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ServerSection, TaskDef};
use crate::errors::{PipelineError, Result};
use crate::order::OrderKey;
use crate::scene::{Attributes, Node};
use crate::selector::{PathPattern, Selector};
use crate::task::{BodyLibrary, NodeFilter, RunCondition, TaskDecl};

/// Reject include cycles (including a file including itself).
///
/// Edge direction: includer -> included.
pub fn check_include_graph(files: &[PathBuf], edges: &[(PathBuf, PathBuf)]) -> Result<()> {
    let mut graph: DiGraphMap<&Path, ()> = DiGraphMap::new();
    for file in files {
        graph.add_node(file.as_path());
    }
    for (from, to) in edges {
        graph.add_edge(from.as_path(), to.as_path(), ());
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PipelineError::IncludeCycle(format!(
            "include cycle involving {}",
            cycle.node_id().display()
        ))),
    }
}

pub fn validate_server_section(section: &ServerSection) -> Result<()> {
    if section.extensions.is_empty() {
        return Err(PipelineError::ConfigError(
            "[config].extensions must name at least one extension".to_string(),
        ));
    }
    if section.debounce_ms == 0 {
        return Err(PipelineError::ConfigError(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    for pattern in &section.exclude {
        Glob::new(pattern).map_err(|e| {
            PipelineError::ConfigError(format!("[config].exclude: bad glob '{pattern}': {e}"))
        })?;
    }
    Ok(())
}

/// Turn a `[[task]]` table into a declaration, compiling its order, path
/// and selectors.
pub fn task_decl(def: &TaskDef, bodies: &BodyLibrary, origin: &Path) -> Result<TaskDecl> {
    let body = bodies.get(&def.body).ok_or_else(|| {
        PipelineError::ConfigError(format!(
            "task '{}' in {}: unknown body '{}'",
            def.name,
            origin.display(),
            def.body
        ))
    })?;

    let mut decl = TaskDecl::new(def.name.clone(), body)
        .cache(def.cache)
        .cache_override(def.cache_override)
        .recurse(def.recurse)
        .log(def.log)
        .params(Attributes::from(def.params.clone()));

    if let Some(order) = &def.order {
        decl = decl.order(OrderKey::parse(order)?);
    }
    if let Some(path) = &def.path {
        decl = decl.path(PathPattern::parse(path)?);
    }
    if let Some(select) = &def.select {
        decl = decl.select(Selector::parse(select)?);
    }
    if let Some(filter) = &def.filter {
        let selector = Selector::parse(filter)?;
        let filter: NodeFilter = Arc::new(move |node: &Node| selector.matches(node));
        decl = decl.filter(filter);
    }
    if let Some(condition) = &def.condition {
        let selector = Selector::parse(condition)?;
        let condition: RunCondition = Arc::new(move |data: &Attributes| selector.matches(data));
        decl = decl.condition(condition);
    }

    Ok(decl)
}
