// tests/order_keys.rs

mod common;

use std::error::Error;
use std::sync::{Arc, Mutex};

use crate::common::builders::recording_body;
use scenepipe::errors::PipelineError;
use scenepipe::order::OrderKey;
use scenepipe::scene::SceneGraph;
use scenepipe::task::{TaskDecl, TaskRegistry};

type TestResult = Result<(), Box<dyn Error>>;

fn key(s: &str) -> OrderKey {
    OrderKey::parse(s).unwrap()
}

fn names_in_order(registry: &TaskRegistry) -> Vec<String> {
    registry
        .tasks_sorted()
        .into_iter()
        .map(|t| t.name().to_string())
        .collect()
}

#[test]
fn numeric_segments_compare_numerically() {
    assert!(key("2") < key("10"));
    assert!(key("10.9") < key("10.10"));
    assert!(key("30.40.5") < key("30.40.12"));
}

#[test]
fn prefix_sorts_before_its_extensions() {
    assert!(key("10") < key("10.1"));
    assert!(key("10.1") < key("10.1.0"));
    assert!(key("9.99.99") < key("10"));
}

#[test]
fn numbers_sort_before_text() {
    assert!(key("10.5") < key("10.a"));
    assert!(key("10.a") < key("10.b"));
}

#[test]
fn malformed_keys_are_configuration_errors() {
    for bad in ["", "10..2", ".10", "10.", "  "] {
        let err = OrderKey::parse(bad).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOrder { .. }), "{bad:?}");
        assert!(err.is_configuration());
    }
}

#[test]
fn wildcards_resolve_in_registration_order() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();

    for name in ["a", "b", "c"] {
        let resolved = registry.register(
            TaskDecl::new(name, recording_body(&log, name)).order(key("10.+")),
        )?;
        assert!(resolved.to_string().starts_with("10."));
    }

    let orders: Vec<String> = registry
        .tasks_sorted()
        .iter()
        .map(|t| t.order().to_string())
        .collect();
    assert_eq!(orders, vec!["10.1", "10.2", "10.3"]);

    scenepipe::run(SceneGraph::empty(), &registry);
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn equal_keys_keep_registration_order() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry.register(TaskDecl::new("late", recording_body(&log, "late")).order(key("20")))?;
    registry.register(TaskDecl::new("first", recording_body(&log, "first")).order(key("10")))?;
    registry.register(TaskDecl::new("second", recording_body(&log, "second")).order(key("10")))?;

    assert_eq!(names_in_order(&registry), vec!["first", "second", "late"]);
    Ok(())
}

#[test]
fn undecorated_task_runs_right_after_its_predecessor() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry.register(TaskDecl::new("roads", recording_body(&log, "roads")).order(key("20.5")))?;
    let follow = registry.register(TaskDecl::new("roads_cleanup", recording_body(&log, "cleanup")))?;
    registry.register(TaskDecl::new("water", recording_body(&log, "water")).order(key("20.7")))?;

    assert_eq!(follow.to_string(), "20.6");
    assert_eq!(
        registry.get("roads_cleanup").unwrap().declared_order().to_string(),
        "20.+"
    );
    assert_eq!(names_in_order(&registry), vec!["roads", "roads_cleanup", "water"]);
    Ok(())
}

#[test]
fn first_undecorated_task_gets_a_top_level_slot() -> TestResult {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    let resolved = registry.register(TaskDecl::new("only", recording_body(&log, "only")))?;
    assert_eq!(resolved.to_string(), "1");
    Ok(())
}

#[test]
fn wildcard_scope_conflict_is_rejected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry
        .register(TaskDecl::new("a", recording_body(&log, "a")).order(key("10.+")))
        .unwrap();
    let err = registry
        .register(TaskDecl::new("b", recording_body(&log, "b")).order(key("10.1")))
        .unwrap_err();
    assert!(matches!(err, PipelineError::WildcardConflict(_)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn duplicate_task_names_are_rejected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry
        .register(TaskDecl::new("a", recording_body(&log, "a")).order(key("1")))
        .unwrap();
    let err = registry
        .register(TaskDecl::new("a", recording_body(&log, "a")).order(key("2")))
        .unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError(_)));
}

#[test]
fn exhausted_wildcard_is_a_configuration_error() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = TaskRegistry::new();
    registry
        .register(TaskDecl::new("last", recording_body(&log, "last")).order(key("10.18446744073709551615")))
        .unwrap();
    let err = registry
        .register(TaskDecl::new("next", recording_body(&log, "next")).order(key("10.+")))
        .unwrap_err();
    assert!(err.is_configuration(), "unexpected error: {err}");
    assert_eq!(registry.len(), 1);

    // The failed registration leaves the resolver usable.
    registry
        .register(TaskDecl::new("other", recording_body(&log, "other")).order(key("11.+")))
        .unwrap();
    assert_eq!(registry.get("other").unwrap().order().to_string(), "11.1");
}
