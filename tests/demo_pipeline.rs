// tests/demo_pipeline.rs

mod common;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use crate::common::init_tracing;
use scenepipe::config::DefinitionLoader;
use scenepipe::exec::RunStatus;
use scenepipe::fs::RealFileSystem;
use scenepipe::scene::SceneGraph;
use scenepipe::task::BodyLibrary;
use scenepipe::types::CacheStorageMode;

type TestResult = Result<(), Box<dyn Error>>;

fn demo_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/osm_base")
}

fn child_names(graph: &SceneGraph, path: &str) -> Vec<String> {
    graph
        .find(path)
        .map(|n| n.children.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default()
}

#[test]
fn osm_base_demo_sorts_features_into_layers() -> TestResult {
    init_tracing();
    let dir = demo_dir();
    let mut loader = DefinitionLoader::new(
        dir.join("pipeline.toml"),
        Arc::new(RealFileSystem),
        Arc::new(BodyLibrary::with_builtins()),
    );
    let loaded = loader.load()?;
    assert_eq!(loaded.config.name.as_deref(), Some("osm base"));
    assert_eq!(loaded.config.cache_storage, CacheStorageMode::File);
    assert_eq!(loaded.modules.len(), 4);

    let order: Vec<String> = loaded
        .registry
        .tasks_sorted()
        .iter()
        .map(|t| format!("{} {}", t.order(), t.name()))
        .collect();
    assert_eq!(
        order,
        vec![
            "1 Stamp run",
            "2 Create layers",
            "5 Drop broken geometry",
            "20.1 Measure buildings",
            "20.2 Tag tall buildings (30 m and up)",
            "20.3 Move buildings",
            "30.1 Classify major roads",
            "30.2 Move roads",
            "40.1 Move points of interest",
        ]
    );

    let text = std::fs::read_to_string(dir.join("features.json"))?;
    let graph = SceneGraph::from_json_str(&text)?;
    let (graph, state) = scenepipe::run(graph, &loaded.registry);

    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.data.get_str("map"), Some("osm base"));
    assert!(child_names(&graph, "/Features").is_empty());
    assert_eq!(child_names(&graph, "/Layers/Buildings"), vec!["way_1001", "way_1002"]);
    assert_eq!(child_names(&graph, "/Layers/Roads"), vec!["way_2001", "way_2002"]);
    assert_eq!(child_names(&graph, "/Layers/POI"), vec!["node_3001"]);

    let buildings = graph.find("/Layers/Buildings").ok_or("missing buildings layer")?;
    let tall: Vec<&str> = buildings
        .children
        .iter()
        .filter(|b| b.attrs.get_bool("tall") == Some(true))
        .map(|b| b.name.as_str())
        .collect();
    assert_eq!(tall, vec!["way_1002"]);
    assert_eq!(buildings.children[0].attrs.get_f64("geom:area"), Some(300.0));

    let roads = graph.find("/Layers/Roads").ok_or("missing roads layer")?;
    assert_eq!(roads.children[0].attrs.get_str("class"), Some("major"));
    assert_eq!(roads.children[1].attrs.get_str("class"), None);
    Ok(())
}
