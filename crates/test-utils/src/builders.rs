#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use scenepipe::errors::TaskError;
use scenepipe::scene::{Geometry, Node, SceneGraph};
use scenepipe::task::{body_fn, BodyOutcome, Need, TaskBody};

/// Axis-aligned square polygon with its lower-left corner at `(x, y)`.
pub fn square(name: &str, x: f64, y: f64, size: f64) -> Node {
    Node::new(name).with_geometry(Geometry::polygon(vec![
        [x, y],
        [x + size, y],
        [x + size, y + size],
        [x, y + size],
        [x, y],
    ]))
}

pub fn building(name: &str, size: f64, height: i64) -> Node {
    square(name, 0.0, 0.0, size)
        .with_attr("type", "building")
        .with_attr("height", height)
}

pub fn road(name: &str, highway: &str) -> Node {
    Node::new(name)
        .with_geometry(Geometry::line(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 5.0]]))
        .with_attr("type", "road")
        .with_attr("highway", highway)
}

pub fn poi(name: &str, amenity: &str) -> Node {
    Node::new(name)
        .with_geometry(Geometry::point(1.0, 2.0))
        .with_attr("type", "poi")
        .with_attr("amenity", amenity)
}

/// A graph whose root holds `children` directly.
pub fn graph_with(children: Vec<Node>) -> SceneGraph {
    let mut graph = SceneGraph::empty();
    for child in children {
        graph.append(child);
    }
    graph
}

/// ```text
/// /Features
///   b1  building 10x10, height 12
///   b2  building 4x4, height 30
///   r1  road, primary
///   r2  road, residential
///   p1  poi, cafe
/// ```
pub fn feature_graph() -> SceneGraph {
    let features = Node::new("Features")
        .with_child(building("b1", 10.0, 12))
        .with_child(building("b2", 4.0, 30))
        .with_child(road("r1", "primary"))
        .with_child(road("r2", "residential"))
        .with_child(poi("p1", "cafe"));
    graph_with(vec![features])
}

/// Sets `key = value` on every node it visits and counts calls.
pub fn tagging_body(key: &'static str, value: &'static str) -> (Arc<dyn TaskBody>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let body = body_fn(&[Need::Node], move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        ctx.node()?.attrs.set(key, value);
        Ok(BodyOutcome::Keep)
    });
    (body, calls)
}

/// Fails with a node-level error on nodes named in `names` (after mutating
/// them, so restoration is observable); marks every other node `ok = true`.
pub fn failing_on(names: &[&str]) -> (Arc<dyn TaskBody>, Arc<AtomicUsize>) {
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let body = body_fn(&[Need::Node], move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        let node = ctx.node()?;
        if names.contains(&node.name) {
            node.attrs.set("touched", true);
            return Err(TaskError::node(format!("cannot process {}", node.name)));
        }
        node.attrs.set("ok", true);
        Ok(BodyOutcome::Keep)
    });
    (body, calls)
}

pub fn fatal_body(msg: &'static str) -> Arc<dyn TaskBody> {
    body_fn(&[Need::Node], move |_| Err(TaskError::fatal(msg)))
}

/// Path-less body appending `label` to `log` each time it runs.
pub fn recording_body(log: &Arc<Mutex<Vec<String>>>, label: &str) -> Arc<dyn TaskBody> {
    let log = Arc::clone(log);
    let label = label.to_string();
    body_fn(&[], move |_| {
        log.lock().unwrap().push(label.clone());
        Ok(BodyOutcome::Keep)
    })
}

/// Path-less body writing `key = value` into the shared data map.
pub fn data_body(key: &'static str, value: i64) -> Arc<dyn TaskBody> {
    body_fn(&[Need::Data], move |ctx| {
        ctx.data()?.set(key, value);
        Ok(BodyOutcome::Keep)
    })
}

/// Marks nodes `ok = true`, but panics (after touching it) on the node named
/// `name`.
pub fn panicking_on(name: &'static str) -> Arc<dyn TaskBody> {
    body_fn(&[Need::Node], move |ctx| {
        let node = ctx.node()?;
        node.attrs.set("touched", true);
        if node.name == name {
            panic!("body gave up on {name}");
        }
        node.attrs.set("ok", true);
        Ok(BodyOutcome::Keep)
    })
}
