// tests/executor_cache.rs

mod common;

use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::common::builders::{feature_graph, tagging_body};
use crate::common::init_tracing;
use scenepipe::exec::{CacheStore, Executor, FileCacheStore, RunStatus};
use scenepipe::fs::mock::MockFileSystem;
use scenepipe::fs::FileSystem;
use scenepipe::order::OrderKey;
use scenepipe::scene::Attributes;
use scenepipe::selector::PathPattern;
use scenepipe::errors::PipelineError;
use scenepipe::task::{body_fn, BodyLibrary, BodyOutcome, Need, TaskBody, TaskDecl, TaskRegistry};

type TestResult = Result<(), Box<dyn Error>>;

fn cached_registry(body: Arc<dyn TaskBody>, cache_override: bool) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry
        .register(
            TaskDecl::new("tag", body)
                .order(OrderKey::parse("10").unwrap())
                .path(PathPattern::parse("/Features/*").unwrap())
                .cache(true)
                .cache_override(cache_override),
        )
        .unwrap();
    registry
}

#[test]
fn second_run_is_served_from_cache() -> TestResult {
    init_tracing();
    let (body, calls) = tagging_body("seen", "yes");
    let registry = cached_registry(body, false);
    let mut executor = Executor::in_memory();

    let mut first = feature_graph();
    let s1 = executor.run(&mut first, &registry);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(s1.metrics_for("tag").unwrap().cache_hits, 0);
    assert_eq!(executor.cache().len(), 5);

    let mut second = feature_graph();
    let s2 = executor.run(&mut second, &registry);
    assert_eq!(calls.load(Ordering::SeqCst), 5, "body must not run on hits");
    assert_eq!(s2.metrics_for("tag").unwrap().cache_hits, 5);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn changed_node_misses_the_cache() -> TestResult {
    let (body, calls) = tagging_body("seen", "yes");
    let registry = cached_registry(body, false);
    let mut executor = Executor::in_memory();

    executor.run(&mut feature_graph(), &registry);

    let mut changed = feature_graph();
    changed
        .find_mut("/Features/b1")
        .unwrap()
        .attrs
        .set("height", 99i64);
    let state = executor.run(&mut changed, &registry);

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(state.metrics_for("tag").unwrap().cache_hits, 4);
    assert_eq!(changed.find("/Features/b1").unwrap().attrs.get_str("seen"), Some("yes"));
    Ok(())
}

#[test]
fn cache_override_always_runs_the_body() -> TestResult {
    let (body, calls) = tagging_body("seen", "yes");
    let registry = cached_registry(body, true);
    let mut executor = Executor::in_memory();

    executor.run(&mut feature_graph(), &registry);
    let state = executor.run(&mut feature_graph(), &registry);

    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(state.metrics_for("tag").unwrap().cache_hits, 0);
    assert_eq!(executor.cache().len(), 5, "entries are refreshed, not duplicated");
    Ok(())
}

#[test]
fn new_generation_clears_the_cache() -> TestResult {
    let (body, calls) = tagging_body("seen", "yes");
    let registry = cached_registry(body, false);
    let mut executor = Executor::in_memory();

    executor.sync_generation(1);
    executor.run(&mut feature_graph(), &registry);
    executor.sync_generation(1);
    executor.run(&mut feature_graph(), &registry);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    executor.sync_generation(2);
    assert!(executor.cache().is_empty());
    executor.run(&mut feature_graph(), &registry);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    Ok(())
}

#[test]
fn cached_removal_is_replayed() -> TestResult {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let body = body_fn(&[Need::Node], move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        let is_road = ctx.node()?.attrs.get_str("type") == Some("road");
        Ok(if is_road { BodyOutcome::Remove } else { BodyOutcome::Keep })
    });
    let registry = cached_registry(body, false);
    let mut executor = Executor::in_memory();

    let mut first = feature_graph();
    executor.run(&mut first, &registry);
    let mut second = feature_graph();
    executor.run(&mut second, &registry);

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(second.find("/Features/r1").is_none());
    assert!(second.find("/Features/r2").is_none());
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn file_store_persists_entries_under_the_cache_dir() -> TestResult {
    let fs = MockFileSystem::new();
    let store = FileCacheStore::new(Path::new("/proj"), Arc::new(fs.clone()));
    let (body, calls) = tagging_body("seen", "yes");
    let registry = cached_registry(body, false);

    let mut executor = Executor::new(Box::new(store));
    executor.run(&mut feature_graph(), &registry);

    let paths = fs.paths();
    assert_eq!(paths.len(), 5);
    assert!(paths.iter().all(|p| p.starts_with("/proj/.scenepipe/cache")));

    // A fresh executor over the same files starts warm, even after
    // adopting its first registry generation.
    let store = FileCacheStore::new(Path::new("/proj"), Arc::new(fs.clone()));
    let mut warm = Executor::new(Box::new(store));
    warm.sync_generation(1);
    let state = warm.run(&mut feature_graph(), &registry);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(state.metrics_for("tag").unwrap().cache_hits, 5);
    Ok(())
}

#[test]
fn corrupted_file_entries_are_misses() -> TestResult {
    let fs = MockFileSystem::new();
    let (body, calls) = tagging_body("seen", "yes");
    let registry = cached_registry(body, false);

    let mut executor = Executor::new(Box::new(FileCacheStore::new(
        Path::new("/proj"),
        Arc::new(fs.clone()),
    )));
    executor.run(&mut feature_graph(), &registry);

    let paths = fs.paths();
    // One unreadable entry, one with a tampered outcome.
    fs.add_file(&paths[0], "{ not json");
    let text = fs.read_to_string(&paths[1])?;
    let mut entry: serde_json::Value = serde_json::from_str(&text)?;
    entry["outcome"]["node"]["attrs"]["seen"] = serde_json::Value::String("forged".into());
    fs.add_file(&paths[1], serde_json::to_vec(&entry)?);

    let mut graph = feature_graph();
    let state = executor.run(&mut graph, &registry);

    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 7);
    assert_eq!(state.metrics_for("tag").unwrap().cache_hits, 3);
    let forged = graph
        .root()
        .descendants()
        .filter(|n| n.attrs.get_str("seen") == Some("forged"))
        .count();
    assert_eq!(forged, 0);
    Ok(())
}

#[test]
fn params_are_part_of_the_task_identity() -> TestResult {
    let (body, calls) = tagging_body("seen", "yes");
    let mut executor = Executor::in_memory();

    for threshold in [1i64, 2] {
        let mut params = Attributes::new();
        params.set("threshold", threshold);
        let mut registry = TaskRegistry::new();
        registry.register(
            TaskDecl::new("tag", body.clone())
                .order(OrderKey::parse("10")?)
                .path(PathPattern::parse("/Features/*")?)
                .cache(true)
                .params(params),
        )?;
        executor.run(&mut feature_graph(), &registry);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 10);
    Ok(())
}

#[test]
fn graph_restructuring_bodies_cannot_be_cached() -> TestResult {
    let bodies = BodyLibrary::with_builtins();
    for name in ["node.move", "node.copy"] {
        let body = bodies.get(name).ok_or("missing builtin")?;
        let mut registry = TaskRegistry::new();
        let err = registry
            .register(
                TaskDecl::new("relocate", body)
                    .order(OrderKey::parse("10").unwrap())
                    .path(PathPattern::parse("/Features/*").unwrap())
                    .params([("to", "/Moved")].into_iter().collect())
                    .cache(true),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)), "{name}: {err}");
        assert!(registry.is_empty());
    }
    Ok(())
}

#[test]
fn uncached_moves_are_deterministic_across_runs() -> TestResult {
    let bodies = BodyLibrary::with_builtins();
    let mut registry = TaskRegistry::new();
    registry.register(
        TaskDecl::new("relocate", bodies.get("node.move").ok_or("missing builtin")?)
            .order(OrderKey::parse("10").unwrap())
            .path(PathPattern::parse("/Features/*").unwrap())
            .params([("to", "/Moved")].into_iter().collect()),
    )?;

    let mut executor = Executor::in_memory();
    let mut first = feature_graph();
    executor.run(&mut first, &registry);
    let mut second = feature_graph();
    executor.run(&mut second, &registry);

    assert_eq!(first.find("/Moved").map(|n| n.children.len()), Some(5));
    assert_eq!(first.to_json()?, second.to_json()?);
    Ok(())
}
