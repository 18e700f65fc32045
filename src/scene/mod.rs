// src/scene/mod.rs

//! The scene graph: nodes, attribute values and geometry payloads.

pub mod geometry;
pub mod graph;
pub mod node;
pub mod value;

pub use geometry::{GeomType, Geometry, GeometryEngine, GeometryError, PlanarEngine};
pub use graph::SceneGraph;
pub use node::{Node, NodeId};
pub use value::{Attributes, Value};
