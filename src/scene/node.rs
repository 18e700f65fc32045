// src/scene/node.rs

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::scene::geometry::{GeomType, Geometry};
use crate::scene::value::{Attributes, Value};
use crate::selector::Selector;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
///
/// Ids are never serialized or hashed, so they do not leak into exports or
/// cache fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An element of the scene graph. Children are owned, so the tree is acyclic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(skip, default = "NodeId::fresh")]
    id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.geometry == other.geometry
            && self.attrs == other.attrs
            && self.children == other.children
    }
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::fresh(),
            name: name.into(),
            geometry: None,
            attrs: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.set(key, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn geom_type(&self) -> Option<GeomType> {
        self.geometry.as_ref().map(Geometry::geom_type)
    }

    /// Deep copy with fresh identities for the node and all descendants.
    pub fn duplicate(&self) -> Node {
        Node {
            id: NodeId::fresh(),
            name: self.name.clone(),
            geometry: self.geometry.clone(),
            attrs: self.attrs.clone(),
            children: self.children.iter().map(Node::duplicate).collect(),
        }
    }

    pub fn append(&mut self, child: Node) -> NodeId {
        let id = child.id;
        self.children.push(child);
        id
    }

    /// Pre-order walk of all descendants (self excluded), in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Lazily yields descendants matching `selector`, in document order.
    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = &'a Node> + 'a {
        self.descendants().filter(move |n| selector.matches(*n))
    }

    /// Resolve a slash-separated name path relative to this node.
    ///
    /// `"Features/Buildings"` and `"/Features/Buildings"` are equivalent.
    /// With duplicate names the first child in order wins.
    pub fn find(&self, path: &str) -> Option<&Node> {
        let mut current = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = current.children.iter().find(|c| c.name == part)?;
        }
        Some(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut current = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = current.children.iter_mut().find(|c| c.name == part)?;
        }
        Some(current)
    }

    pub fn find_by_id(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.descendants().find(|n| n.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        for child in self.children.iter_mut() {
            if let Some(found) = child.find_by_id_mut(id) {
                return Some(found);
            }
        }
        None
    }

    /// Detach the descendant with `id`. Returns `None` if it is not (or no
    /// longer) in this subtree.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            return Some(self.children.remove(pos));
        }
        self.children.iter_mut().find_map(|c| c.remove(id))
    }

    /// Swap the descendant with `id` for `replacement`, keeping its position
    /// among its siblings. Returns the old node.
    pub fn replace(&mut self, id: NodeId, replacement: Node) -> Result<Node, Node> {
        match self.parent_of_mut(id) {
            Some(parent) => {
                let Some(pos) = parent.children.iter().position(|c| c.id == id) else {
                    return Err(replacement);
                };
                Ok(std::mem::replace(&mut parent.children[pos], replacement))
            }
            None => Err(replacement),
        }
    }

    /// Slash path of names from this node down to `id`, e.g. `/Features/a`.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut trail = Vec::new();
        if self.collect_path(id, &mut trail) {
            Some(format!("/{}", trail.join("/")))
        } else {
            None
        }
    }

    fn collect_path<'a>(&'a self, id: NodeId, trail: &mut Vec<&'a str>) -> bool {
        for child in &self.children {
            trail.push(&child.name);
            if child.id == id || child.collect_path(id, trail) {
                return true;
            }
            trail.pop();
        }
        false
    }

    fn parent_of_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.children.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.parent_of_mut(id))
    }
}

/// Iterator returned by [`Node::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
