// src/scene/graph.rs

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::scene::node::{Node, NodeId};
use crate::selector::Selector;

/// Name given to the root of an empty graph.
pub const ROOT_NAME: &str = "Root";

/// The mutable scene: an owned tree under a single root node.
///
/// The root itself is never a task target; paths and selectors range over
/// its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneGraph {
    root: Node,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::empty()
    }
}

impl SceneGraph {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn empty() -> Self {
        Self::new(Node::new(ROOT_NAME))
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    pub fn find(&self, path: &str) -> Option<&Node> {
        self.root.find(path)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        self.root.find_mut(path)
    }

    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = &'a Node> + 'a {
        self.root.select(selector)
    }

    /// Append a top-level node under the root.
    pub fn append(&mut self, node: Node) -> NodeId {
        self.root.append(node)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        self.root.remove(id)
    }

    pub fn replace(&mut self, id: NodeId, replacement: Node) -> std::result::Result<Node, Node> {
        self.root.replace(id, replacement)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.root.find_by_id(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.root.find_by_id_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn path_of(&self, id: NodeId) -> Option<String> {
        self.root.path_of(id)
    }

    pub fn len(&self) -> usize {
        self.root.descendants().count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
