// src/task/spec.rs

use std::fmt;
use std::sync::Arc;

use crate::order::OrderKey;
use crate::scene::{Attributes, Node, NodeId, SceneGraph};
use crate::selector::{PathPattern, Selector};
use crate::task::body::{Need, TaskBody};

pub type NodeFilter = Arc<dyn Fn(&Node) -> bool + Send + Sync>;
pub type RunCondition = Arc<dyn Fn(&Attributes) -> bool + Send + Sync>;

/// A task as declared, before registration assigns it an order.
#[derive(Clone)]
pub struct TaskDecl {
    pub(crate) name: String,
    pub(crate) order: Option<OrderKey>,
    pub(crate) path: Option<PathPattern>,
    pub(crate) select: Option<Selector>,
    pub(crate) filter: Option<NodeFilter>,
    pub(crate) condition: Option<RunCondition>,
    pub(crate) cache: bool,
    pub(crate) cache_override: bool,
    pub(crate) recurse: bool,
    pub(crate) log: bool,
    pub(crate) params: Attributes,
    pub(crate) body: Arc<dyn TaskBody>,
}

impl TaskDecl {
    pub fn new(name: impl Into<String>, body: Arc<dyn TaskBody>) -> Self {
        Self {
            name: name.into(),
            order: None,
            path: None,
            select: None,
            filter: None,
            condition: None,
            cache: false,
            cache_override: false,
            recurse: false,
            log: false,
            params: Attributes::new(),
            body,
        }
    }

    pub fn order(mut self, order: OrderKey) -> Self {
        self.order = Some(order);
        self
    }

    pub fn path(mut self, path: PathPattern) -> Self {
        self.path = Some(path);
        self
    }

    pub fn select(mut self, selector: Selector) -> Self {
        self.select = Some(selector);
        self
    }

    pub fn filter(mut self, filter: NodeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn condition(mut self, condition: RunCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache_override(mut self, cache_override: bool) -> Self {
        self.cache_override = cache_override;
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub fn params(mut self, params: Attributes) -> Self {
        self.params = params;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order_key(&self) -> Option<&OrderKey> {
        self.order.as_ref()
    }
}

impl fmt::Debug for TaskDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDecl")
            .field("name", &self.name)
            .field("order", &self.order.as_ref().map(|o| o.to_string()))
            .finish_non_exhaustive()
    }
}

/// A registered, immutable task.
#[derive(Clone)]
pub struct TaskSpec {
    decl: TaskDecl,
    declared_order: OrderKey,
    resolved_order: OrderKey,
    seq: usize,
}

impl TaskSpec {
    pub(crate) fn new(decl: TaskDecl, declared_order: OrderKey, resolved_order: OrderKey, seq: usize) -> Self {
        Self {
            decl,
            declared_order,
            resolved_order,
            seq,
        }
    }

    pub fn name(&self) -> &str {
        &self.decl.name
    }

    /// The order as written (or inherited), wildcards included.
    pub fn declared_order(&self) -> &OrderKey {
        &self.declared_order
    }

    pub fn order(&self) -> &OrderKey {
        &self.resolved_order
    }

    pub fn seq(&self) -> usize {
        self.seq
    }

    pub fn path(&self) -> Option<&PathPattern> {
        self.decl.path.as_ref()
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.decl.select.as_ref()
    }

    pub fn has_filter(&self) -> bool {
        self.decl.filter.is_some()
    }

    pub fn has_condition(&self) -> bool {
        self.decl.condition.is_some()
    }

    pub fn cache(&self) -> bool {
        self.decl.cache
    }

    pub fn cache_override(&self) -> bool {
        self.decl.cache_override
    }

    pub fn recurse(&self) -> bool {
        self.decl.recurse
    }

    pub fn log(&self) -> bool {
        self.decl.log
    }

    pub fn params(&self) -> &Attributes {
        &self.decl.params
    }

    pub fn body(&self) -> &Arc<dyn TaskBody> {
        &self.decl.body
    }

    pub fn needs(&self) -> &[Need] {
        self.decl.body.needs()
    }

    pub fn needs_external(&self) -> bool {
        self.needs().contains(&Need::External)
    }

    /// Tasks with a path, selector or filter run once per target node;
    /// everything else runs once per run.
    pub fn is_per_node(&self) -> bool {
        self.decl.path.is_some() || self.decl.select.is_some() || self.decl.filter.is_some()
    }

    pub fn should_run(&self, data: &Attributes) -> bool {
        self.decl.condition.as_ref().is_none_or(|cond| cond(data))
    }

    /// Snapshot of target ids in document order.
    ///
    /// Path first, then selector, then filter. Without a path every
    /// descendant of the root is a candidate.
    pub fn resolve_targets(&self, graph: &SceneGraph) -> Vec<NodeId> {
        let root = graph.root();
        let candidates: Vec<&Node> = match &self.decl.path {
            Some(pattern) => pattern.resolve(root, self.decl.recurse),
            None => root.descendants().collect(),
        };

        candidates
            .into_iter()
            .filter(|n| self.decl.select.as_ref().is_none_or(|s| s.matches(*n)))
            .filter(|n| self.decl.filter.as_ref().is_none_or(|f| f(*n)))
            .map(Node::id)
            .collect()
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.decl.name)
            .field("order", &self.resolved_order.to_string())
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
