// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod order;
pub mod scene;
pub mod selector;
pub mod server;
pub mod task;
pub mod types;
pub mod watch;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{DefinitionLoader, LoadedPipeline};
use crate::engine::{CoreServer, Runtime, RuntimeOptions, ServerEvent};
use crate::exec::{build_store, Executor, RunState, WorkerBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::scene::{PlanarEngine, SceneGraph};
use crate::server::{spawn_listener, Hub, StatusBoard};
use crate::task::{BodyLibrary, ExternalContext, RegistrySource, TaskRegistry};
use crate::watch::{spawn_watcher, SourceFilter, WatchOptions};

/// Run every task of `registry` once over `graph`, with an in-memory cache
/// and the planar geometry engine.
///
/// A run that hits a fatal task error still returns; its state has status
/// `Failed` (see [`RunState::check`]).
pub fn run(mut graph: SceneGraph, registry: &TaskRegistry) -> (SceneGraph, RunState) {
    let mut executor = Executor::in_memory().with_external(default_external());
    let state = executor.run(&mut graph, registry);
    (graph, state)
}

/// Build a fresh registry from `source`. The previous registry is untouched
/// on failure.
pub fn reload(source: &mut dyn RegistrySource) -> errors::Result<TaskRegistry> {
    source.reload()
}

/// External context handed to bodies that declare the `external` need.
pub fn default_external() -> ExternalContext {
    ExternalContext::new(Arc::new(PlanarEngine))
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - definition loading (prelude pinned once)
/// - the worker backend and its cache store
/// - the dev server and file watcher (skipped with `--once`)
/// - Ctrl-C handling
/// - the live-reload runtime
pub async fn run_cli(args: CliArgs) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let bodies = Arc::new(BodyLibrary::with_builtins());

    let mut loader = DefinitionLoader::new(&args.pipeline, fs.clone(), bodies)
        .with_prelude(&args.prelude)
        .context("loading prelude")?;
    let config = loader
        .read_config()
        .with_context(|| format!("reading {}", args.pipeline.display()))?;

    if args.dry_run {
        let loaded = loader.load()?;
        print_dry_run(&loaded);
        return Ok(());
    }

    let input = read_input(fs.as_ref(), args.input.as_deref())?;
    let root_dir = loader.root_dir();
    let cache_mode = args.cache.map(Into::into).unwrap_or(config.cache_storage);
    debug!(?cache_mode, root = %root_dir.display(), "cache store selected");

    let executor = Executor::new(build_store(cache_mode, &root_dir, fs.clone()))
        .with_external(default_external());

    let (rt_tx, rt_rx) = mpsc::channel::<ServerEvent>(64);
    let backend = WorkerBackend::new(executor, rt_tx.clone());
    let board = Arc::new(StatusBoard::new(loader.script()));

    // Dev server and watcher only make sense when we keep running.
    let mut hub = None;
    let _watcher_handle = if !args.once {
        let sessions = Hub::new();
        let listen = args.listen.clone().unwrap_or_else(|| config.listen.clone());
        let addr = spawn_listener(&listen, sessions.clone(), board.clone()).await?;
        info!(%addr, "dev server listening");
        hub = Some(sessions);

        let options = WatchOptions {
            root: root_dir.clone(),
            filter: SourceFilter::from_section(&config)?,
            debounce: Duration::from_millis(config.debounce_ms),
            known_sources: loader.modules().paths().cloned().collect(),
        };
        Some(spawn_watcher(options, fs.clone(), rt_tx.clone())?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(ServerEvent::ShutdownRequested).await;
        });
    }

    rt_tx.send(ServerEvent::StartupRequested).await?;

    let options = RuntimeOptions {
        exit_when_idle: args.once,
    };
    let core = CoreServer::new(options);
    let mut runtime = Runtime::new(core, rt_rx, backend, Box::new(loader), board.clone(), input);
    if let Some(hub) = hub {
        runtime = runtime.with_hub(hub);
    }
    runtime.run().await?;

    if let Some(output) = args.output.as_deref() {
        write_output(fs.as_ref(), &board, output)?;
    }

    if args.once {
        if let Some(err) = board.reload_error() {
            anyhow::bail!("definitions failed to load: {err}");
        }
        if let Some(outcome) = board.committed() {
            outcome.state.check()?;
        }
    }
    Ok(())
}

fn read_input(fs: &dyn FileSystem, path: Option<&Path>) -> Result<SceneGraph> {
    let Some(path) = path else {
        return Ok(SceneGraph::empty());
    };
    let text = fs.read_to_string(path)?;
    let graph = SceneGraph::from_json_str(&text)
        .with_context(|| format!("parsing input graph {}", path.display()))?;
    info!(path = %path.display(), nodes = graph.len(), "input graph loaded");
    Ok(graph)
}

fn write_output(fs: &dyn FileSystem, board: &StatusBoard, path: &Path) -> Result<()> {
    let result = board.result();
    let Some(data) = result.data else {
        warn!(path = %path.display(), "no successful run to export");
        return Ok(());
    };
    let text = serde_json::to_string_pretty(&data)?;
    fs.write(path, text.as_bytes())?;
    info!(path = %path.display(), run_id = ?result.run_id, "graph exported");
    Ok(())
}

/// Dry-run output: print the resolved run order and each task's targeting.
fn print_dry_run(loaded: &LoadedPipeline) {
    println!("scenepipe dry-run");
    println!("  config.listen = {}", loaded.config.listen);
    println!("  config.cache_storage = {:?}", loaded.config.cache_storage);
    println!("  config.debounce_ms = {}", loaded.config.debounce_ms);
    println!("  modules ({}):", loaded.modules.len());
    for module in &loaded.modules {
        println!("    {}", module.display());
    }
    println!();

    println!("tasks ({}):", loaded.registry.len());
    for task in loaded.registry.tasks_sorted() {
        println!("  - {} [{}]", task.name(), task.order());
        if task.declared_order() != task.order() {
            println!("      declared: {}", task.declared_order());
        }
        if let Some(path) = task.path() {
            println!("      path: {path}");
        }
        if let Some(selector) = task.selector() {
            println!("      select: {selector}");
        }
        if !task.needs().is_empty() {
            let needs: Vec<&str> = task.needs().iter().map(|n| n.as_str()).collect();
            println!("      needs: {}", needs.join(", "));
        }
        if task.has_filter() {
            println!("      filter: yes");
        }
        if task.has_condition() {
            println!("      condition: yes");
        }
        if task.cache() {
            println!("      cache: {}", if task.cache_override() { "override" } else { "on" });
        }
        if task.recurse() {
            println!("      recurse: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
