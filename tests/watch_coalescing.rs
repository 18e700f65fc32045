// tests/watch_coalescing.rs

mod common;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::common::{init_tracing, with_timeout, write_file};
use scenepipe::config::ServerSection;
use scenepipe::engine::ServerEvent;
use scenepipe::fs::mock::MockFileSystem;
use scenepipe::fs::RealFileSystem;
use scenepipe::watch::{spawn_watcher, Coalescer, SourceFilter, SourceHashes, WatchOptions};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn burst_of_events_is_released_once_after_the_window() {
    let window = Duration::from_millis(150);
    let mut c = Coalescer::new(window);
    let t0 = Instant::now();

    c.push(PathBuf::from("b.toml"), t0);
    c.push(PathBuf::from("a.toml"), t0 + Duration::from_millis(50));
    c.push(PathBuf::from("b.toml"), t0 + Duration::from_millis(100));

    // The window restarts with every event.
    assert!(c.ready(t0 + Duration::from_millis(200)).is_none());
    let batch = c.ready(t0 + Duration::from_millis(250)).unwrap();
    assert_eq!(batch, vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]);

    assert!(c.is_empty());
    assert!(c.deadline().is_none());
    assert!(c.ready(t0 + Duration::from_secs(10)).is_none());
}

#[test]
fn unchanged_content_is_not_a_change() {
    let fs = MockFileSystem::new();
    fs.add_file("/p/pipeline.toml", "a = 1");
    let path = PathBuf::from("/p/pipeline.toml");

    let mut hashes = SourceHashes::new();
    hashes.prime(&fs, [&path]);
    assert!(!hashes.observe(&fs, &path), "touch without edit");

    fs.add_file("/p/pipeline.toml", "a = 2");
    assert!(hashes.observe(&fs, &path));
    assert!(!hashes.observe(&fs, &path));
}

#[test]
fn new_and_deleted_files_count_as_changes() {
    let fs = MockFileSystem::new();
    let path = PathBuf::from("/p/new.toml");
    let mut hashes = SourceHashes::new();

    assert!(hashes.observe(&fs, &path), "first sight of a missing file");
    assert!(!hashes.observe(&fs, &path), "still missing");

    fs.add_file(&path, "x = 1");
    assert!(hashes.observe(&fs, &path));
}

#[test]
fn filter_follows_the_config_section() {
    let section = ServerSection {
        extensions: vec!["toml".into(), "json".into()],
        exclude: vec!["scratch/**".into()],
        ..ServerSection::default()
    };
    let filter = SourceFilter::from_section(&section).unwrap();

    assert!(filter.matches("pipeline.toml"));
    assert!(filter.matches("data/features.json"));
    assert!(!filter.matches("notes.md"));
    assert!(!filter.matches("scratch/tmp.toml"));
    assert!(!filter.matches(".scenepipe/cache/abc.json"));
}

#[tokio::test]
async fn editing_a_definition_file_emits_one_source_changed() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "pipeline.toml", "# v1\n");
    write_file(dir.path(), "notes.md", "hello\n");

    let (tx, mut rx) = mpsc::channel::<ServerEvent>(16);
    let options = WatchOptions {
        root: dir.path().to_path_buf(),
        filter: SourceFilter::new(&["toml".into()], &[])?,
        debounce: Duration::from_millis(100),
        known_sources: vec![dir.path().join("pipeline.toml")],
    };
    let _handle = spawn_watcher(options, Arc::new(RealFileSystem), tx)?;

    // Give the OS watcher a moment to arm.
    tokio::time::sleep(Duration::from_millis(100)).await;
    write_file(dir.path(), "notes.md", "ignored\n");
    write_file(dir.path(), "pipeline.toml", "# v2\n");
    write_file(dir.path(), "pipeline.toml", "# v3\n");

    let event = with_timeout(rx.recv()).await.expect("watcher channel closed");
    match event {
        ServerEvent::SourceChanged { path } => {
            assert_eq!(path.file_name().unwrap(), "pipeline.toml");
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Nothing else arrives for the same burst.
    let extra = tokio::time::timeout(Duration::from_millis(400), rx.recv()).await;
    assert!(extra.is_err(), "expected a single event, got {extra:?}");
    Ok(())
}
