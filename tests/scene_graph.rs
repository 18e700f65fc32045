// tests/scene_graph.rs

mod common;

use crate::common::builders::{building, feature_graph, road, square};
use scenepipe::scene::{
    GeomType, Geometry, GeometryEngine, GeometryError, Node, PlanarEngine, SceneGraph, Value,
};

#[test]
fn append_find_and_path_of() {
    let mut graph = SceneGraph::empty();
    let group = graph.append(Node::new("Buildings"));
    let id = graph
        .get_mut(group)
        .unwrap()
        .append(building("b1", 3.0, 9));

    assert_eq!(graph.path_of(id).as_deref(), Some("/Buildings/b1"));
    assert_eq!(graph.find("/Buildings/b1").unwrap().id(), id);
    assert!(graph.find("/Buildings/b2").is_none());
    assert_eq!(graph.len(), 2);
}

#[test]
fn remove_and_replace_keep_sibling_order() {
    let mut graph = feature_graph();
    let r1 = graph.find("/Features/r1").unwrap().id();
    let b2 = graph.find("/Features/b2").unwrap().id();

    let removed = graph.remove(r1).unwrap();
    assert_eq!(removed.name, "r1");
    assert!(!graph.contains(r1));

    let old = graph.replace(b2, road("b2_as_road", "service")).unwrap();
    assert_eq!(old.name, "b2");

    let order: Vec<&str> = graph
        .find("/Features")
        .unwrap()
        .children
        .iter()
        .map(|n| n.name.as_str())
        .collect();
    assert_eq!(order, vec!["b1", "b2_as_road", "r2", "p1"]);
}

#[test]
fn replace_of_unknown_id_hands_the_node_back() {
    let mut graph = feature_graph();
    let stray = Node::new("stray");
    let stray_id = stray.id();
    let back = graph.replace(stray_id, Node::new("new")).unwrap_err();
    assert_eq!(back.name, "new");
}

#[test]
fn equality_ignores_identities() {
    let a = feature_graph();
    let b = feature_graph();
    assert_ne!(
        a.find("/Features/b1").unwrap().id(),
        b.find("/Features/b1").unwrap().id()
    );
    assert_eq!(a, b);

    let dup = a.root().duplicate();
    assert_eq!(&dup, a.root());
}

#[test]
fn json_export_round_trips_and_omits_ids() {
    let mut graph = feature_graph();
    graph
        .find_mut("/Features/b1")
        .unwrap()
        .attrs
        .set("tags", Value::List(vec!["a".into(), 2i64.into(), 2.5f64.into()]));

    let text = graph.to_json_string().unwrap();
    assert!(!text.contains("\"id\""));
    assert!(text.contains("\"type\": \"Polygon\""));

    let back = SceneGraph::from_json_str(&text).unwrap();
    assert_eq!(back, graph);
    assert_eq!(back.to_json().unwrap(), graph.to_json().unwrap());
}

#[test]
fn planar_engine_measures_polygons() {
    let engine = PlanarEngine;
    let sq = square("s", 1.0, 1.0, 4.0);
    let geom = sq.geometry.as_ref().unwrap();

    assert_eq!(engine.classify(geom), GeomType::Polygon);
    assert!(engine.validate(geom).is_ok());
    assert_eq!(engine.area(geom).unwrap(), 16.0);
    assert_eq!(engine.bounds(geom).unwrap(), [1.0, 1.0, 5.0, 5.0]);
}

#[test]
fn planar_engine_reports_degenerate_and_invalid_shapes() {
    let engine = PlanarEngine;

    let flat = Geometry::polygon(vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 0.0]]);
    assert!(matches!(engine.area(&flat), Err(GeometryError::Degenerate { .. })));

    let open = Geometry::polygon(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    assert!(matches!(engine.validate(&open), Err(GeometryError::Invalid { .. })));

    let line = Geometry::line(vec![[0.0, 0.0]]);
    assert!(engine.validate(&line).is_err());

    let collection = Geometry::new(GeomType::GeometryCollection, vec![vec![[0.0, 0.0]]]);
    assert!(matches!(
        engine.area(&collection),
        Err(GeometryError::Unsupported { op: "area", .. })
    ));
}
