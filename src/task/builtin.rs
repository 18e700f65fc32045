// src/task/builtin.rs

//! Named bodies that TOML definition files can refer to.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::TaskError;
use crate::scene::{Node, NodeId, Value};
use crate::task::body::{body_fn, BodyOutcome, Need, TaskBody, TaskContext};

/// Lookup table from body name to implementation.
#[derive(Clone, Default)]
pub struct BodyLibrary {
    bodies: BTreeMap<String, Arc<dyn TaskBody>>,
}

impl std::fmt::Debug for BodyLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.bodies.keys()).finish()
    }
}

impl BodyLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut lib = Self::new();
        lib.insert("noop", body_fn(&[], |_| Ok(BodyOutcome::Keep)));
        lib.insert("group.create", body_fn(&[Need::Root], group_create));
        lib.insert("node.move", body_fn(&[Need::Root, Need::Node], node_move));
        lib.insert("node.copy", body_fn(&[Need::Root, Need::Node], node_copy));
        lib.insert("node.remove", body_fn(&[Need::Node], |_| Ok(BodyOutcome::Remove)));
        lib.insert("attr.set", body_fn(&[Need::Node], attr_set));
        lib.insert("attr.remove", body_fn(&[Need::Node], attr_remove));
        lib.insert("data.set", body_fn(&[Need::Data], data_set));
        lib.insert(
            "geom.measure",
            body_fn(&[Need::Node, Need::External], geom_measure),
        );
        lib.insert(
            "geom.validate",
            body_fn(&[Need::Node, Need::External, Need::Logger], geom_validate),
        );
        lib
    }

    pub fn insert(&mut self, name: impl Into<String>, body: Arc<dyn TaskBody>) {
        self.bodies.insert(name.into(), body);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskBody>> {
        self.bodies.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bodies.keys().map(String::as_str)
    }
}

fn required_str<'c>(ctx: &'c TaskContext<'_>, key: &str) -> Result<&'c str, TaskError> {
    ctx.params().get_str(key).ok_or_else(|| {
        TaskError::fatal(format!(
            "task '{}' is missing string param '{key}'",
            ctx.task_name()
        ))
    })
}

/// Walk `path` from `root`, creating missing groups on the way.
fn ensure_path(root: &mut Node, path: &str) -> EnsuredPath {
    let mut current = root;
    let mut created = false;
    for part in path.split('/').filter(|p| !p.is_empty()) {
        let pos = match current.children.iter().position(|c| c.name == part) {
            Some(pos) => pos,
            None => {
                current.children.push(Node::new(part));
                created = true;
                current.children.len() - 1
            }
        };
        current = &mut current.children[pos];
    }
    EnsuredPath {
        id: current.id(),
        created,
    }
}

struct EnsuredPath {
    id: NodeId,
    created: bool,
}

/// `params.names`: group names to create, `params.under`: parent path
/// (default: the root). Existing groups are left alone.
fn group_create(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let under = ctx.params().get_str("under").unwrap_or("/").to_string();
    let names: Vec<String> = ctx
        .params()
        .get_list("names")
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let graph = ctx.root()?;
    let parent = ensure_path(graph.root_mut(), &under);
    let Some(parent) = graph.get_mut(parent.id) else {
        return Err(TaskError::node(format!("group parent '{under}' vanished")));
    };
    for name in names {
        if !parent.children.iter().any(|c| c.name == name) {
            parent.children.push(Node::new(name));
        }
    }
    Ok(BodyOutcome::Keep)
}

/// Move the current node under `params.to`, creating the target path.
fn node_move(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let to = required_str(ctx, "to")?.to_string();
    let (graph, id) = ctx.root_and_node()?;

    let target = ensure_path(graph.root_mut(), &to);
    if target.id == id || graph.get(id).and_then(|n| n.find_by_id(target.id)).is_some() {
        return Err(TaskError::node(format!("cannot move a node into itself ({to})")));
    }

    let Some(node) = graph.remove(id) else {
        return Err(TaskError::node(format!("node {id} is no longer in the graph")));
    };
    match graph.get_mut(target.id) {
        Some(parent) => {
            parent.append(node);
            Ok(BodyOutcome::Keep)
        }
        None => Err(TaskError::node(format!("move target '{to}' vanished"))),
    }
}

/// Append a duplicate (fresh ids) of the current node under `params.to`.
fn node_copy(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let to = required_str(ctx, "to")?.to_string();
    let (graph, id) = ctx.root_and_node()?;

    let Some(copy) = graph.get(id).map(Node::duplicate) else {
        return Err(TaskError::node(format!("node {id} is no longer in the graph")));
    };
    let target = ensure_path(graph.root_mut(), &to);
    if target.created {
        tracing::debug!(path = %to, "created copy target");
    }
    match graph.get_mut(target.id) {
        Some(parent) => {
            parent.append(copy);
            Ok(BodyOutcome::Keep)
        }
        None => Err(TaskError::node(format!("copy target '{to}' vanished"))),
    }
}

/// Merge the `params.attrs` table into the node's attributes.
fn attr_set(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let Some(attrs) = ctx.params().get("attrs").and_then(Value::as_map).cloned() else {
        return Err(TaskError::fatal(format!(
            "task '{}' is missing table param 'attrs'",
            ctx.task_name()
        )));
    };
    let node = ctx.node()?;
    for (k, v) in attrs {
        node.attrs.set(k, v);
    }
    Ok(BodyOutcome::Keep)
}

fn attr_remove(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let keys: Vec<String> = ctx
        .params()
        .get_list("keys")
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let node = ctx.node()?;
    for key in keys {
        node.attrs.remove(&key);
    }
    Ok(BodyOutcome::Keep)
}

/// Merge the `params.values` table into the shared data map.
fn data_set(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let values = ctx
        .params()
        .get("values")
        .and_then(Value::as_map)
        .cloned()
        .unwrap_or_default();
    let data = ctx.data()?;
    for (k, v) in values {
        data.set(k, v);
    }
    Ok(BodyOutcome::Keep)
}

/// Store `geom:area` and `geom:bounds` on nodes that carry geometry.
fn geom_measure(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let engine = ctx.external()?.geometry.clone();
    let node = ctx.node()?;
    let Some(geom) = node.geometry.as_ref() else {
        return Ok(BodyOutcome::Keep);
    };

    let area = engine.area(geom)?;
    let bounds = engine.bounds(geom)?;
    node.attrs.set("geom:area", area);
    node.attrs.set(
        "geom:bounds",
        Value::List(bounds.iter().copied().map(Value::Float).collect()),
    );
    Ok(BodyOutcome::Keep)
}

/// Reject invalid geometry. With `params.drop_invalid = true` the node is
/// removed instead of failing.
fn geom_validate(ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    let drop_invalid = ctx.params().get_bool("drop_invalid").unwrap_or(false);
    let engine = ctx.external()?.geometry.clone();
    let logger = ctx.logger()?.clone();
    let node = ctx.node()?;
    let Some(geom) = node.geometry.as_ref() else {
        return Ok(BodyOutcome::Keep);
    };

    match engine.validate(geom) {
        Ok(()) => Ok(BodyOutcome::Keep),
        Err(err) if drop_invalid => {
            logger.info(&format!("dropping '{}': {err}", node.name));
            Ok(BodyOutcome::Remove)
        }
        Err(err) => Err(err.into()),
    }
}
