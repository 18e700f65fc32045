// src/task/body.rs

//! The task body seam: what a body declares, what it receives, what it
//! returns.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::TaskError;
use crate::scene::{Attributes, GeometryEngine, Node, NodeId, SceneGraph};

/// A piece of context a body may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Need {
    Root,
    Node,
    Data,
    Logger,
    External,
}

impl Need {
    pub fn as_str(&self) -> &'static str {
        match self {
            Need::Root => "root",
            Need::Node => "node",
            Need::Data => "data",
            Need::Logger => "logger",
            Need::External => "external",
        }
    }
}

impl fmt::Display for Need {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Need {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Need::Root),
            "node" => Ok(Need::Node),
            "data" => Ok(Need::Data),
            "logger" => Ok(Need::Logger),
            "external" => Ok(Need::External),
            other => Err(format!("unknown need: {other}")),
        }
    }
}

/// What the executor does with the current node after a body returns.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyOutcome {
    /// Keep the node, including any in-place mutation.
    Keep,
    /// Delete the node from the graph.
    Remove,
    /// Substitute the node at the same position.
    Replace(Node),
}

/// A task body. Implementations must be callable from the worker thread.
pub trait TaskBody: Send + Sync {
    fn needs(&self) -> &[Need];

    fn call(&self, ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError>;
}

type BodyFn = dyn Fn(&mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> + Send + Sync;

/// Closure-backed body.
pub struct FnBody {
    needs: Vec<Need>,
    f: Box<BodyFn>,
}

impl TaskBody for FnBody {
    fn needs(&self) -> &[Need] {
        &self.needs
    }

    fn call(&self, ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
        (self.f)(ctx)
    }
}

/// Wrap a closure as a shareable body.
pub fn body_fn<F>(needs: &[Need], f: F) -> Arc<dyn TaskBody>
where
    F: Fn(&mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> + Send + Sync + 'static,
{
    Arc::new(FnBody {
        needs: needs.to_vec(),
        f: Box::new(f),
    })
}

/// Process-wide services and constants, built once and handed by reference
/// to bodies that declare [`Need::External`].
#[derive(Debug, Clone)]
pub struct ExternalContext {
    pub geometry: Arc<dyn GeometryEngine>,
    pub constants: Attributes,
}

impl ExternalContext {
    pub fn new(geometry: Arc<dyn GeometryEngine>) -> Self {
        Self {
            geometry,
            constants: Attributes::new(),
        }
    }

    pub fn with_constants(mut self, constants: Attributes) -> Self {
        self.constants = constants;
        self
    }
}

/// Per-task logger. Tasks declared with `log = true` speak at info level,
/// everything else at debug.
#[derive(Debug, Clone)]
pub struct TaskLogger {
    task: String,
    verbose: bool,
}

impl TaskLogger {
    pub fn new(task: impl Into<String>, verbose: bool) -> Self {
        Self {
            task: task.into(),
            verbose,
        }
    }

    pub fn info(&self, msg: &str) {
        if self.verbose {
            info!(task = %self.task, "{msg}");
        } else {
            debug!(task = %self.task, "{msg}");
        }
    }

    pub fn warn(&self, msg: &str) {
        warn!(task = %self.task, "{msg}");
    }
}

/// The view of the run a body gets. Only declared needs are reachable;
/// anything else is a fatal error.
pub struct TaskContext<'a> {
    task: &'a str,
    needs: &'a [Need],
    graph: &'a mut SceneGraph,
    node: Option<NodeId>,
    data: &'a mut Attributes,
    external: Option<&'a ExternalContext>,
    params: &'a Attributes,
    logger: TaskLogger,
}

impl<'a> TaskContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        task: &'a str,
        needs: &'a [Need],
        graph: &'a mut SceneGraph,
        node: Option<NodeId>,
        data: &'a mut Attributes,
        external: Option<&'a ExternalContext>,
        params: &'a Attributes,
        verbose: bool,
    ) -> Self {
        Self {
            task,
            needs,
            graph,
            node,
            data,
            external,
            params,
            logger: TaskLogger::new(task, verbose),
        }
    }

    fn require(&self, need: Need) -> Result<(), TaskError> {
        if self.needs.contains(&need) {
            Ok(())
        } else {
            Err(TaskError::fatal(format!(
                "task '{}' used '{need}' without declaring it",
                self.task
            )))
        }
    }

    pub fn task_name(&self) -> &str {
        self.task
    }

    /// Task params are always available.
    pub fn params(&self) -> &Attributes {
        self.params
    }

    pub fn root(&mut self) -> Result<&mut SceneGraph, TaskError> {
        self.require(Need::Root)?;
        Ok(&mut *self.graph)
    }

    pub fn node_id(&self) -> Result<NodeId, TaskError> {
        self.require(Need::Node)?;
        self.node
            .ok_or_else(|| TaskError::fatal(format!("task '{}' has no current node", self.task)))
    }

    pub fn node(&mut self) -> Result<&mut Node, TaskError> {
        let id = self.node_id()?;
        let task = self.task;
        self.graph
            .get_mut(id)
            .ok_or_else(|| TaskError::node(format!("task '{task}': node {id} is no longer in the graph")))
    }

    /// Both the graph and the current node id, for bodies that restructure
    /// around their node.
    pub fn root_and_node(&mut self) -> Result<(&mut SceneGraph, NodeId), TaskError> {
        let id = self.node_id()?;
        self.require(Need::Root)?;
        Ok((&mut *self.graph, id))
    }

    pub fn data(&mut self) -> Result<&mut Attributes, TaskError> {
        self.require(Need::Data)?;
        Ok(&mut *self.data)
    }

    pub fn external(&self) -> Result<&'a ExternalContext, TaskError> {
        self.require(Need::External)?;
        self.external
            .ok_or_else(|| TaskError::fatal("no external context configured"))
    }

    pub fn logger(&self) -> Result<&TaskLogger, TaskError> {
        self.require(Need::Logger)?;
        Ok(&self.logger)
    }
}
