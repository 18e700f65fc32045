// src/exec/executor.rs

//! Synchronous single-run executor.
//!
//! One call to [`Executor::run`] walks the registry in order over a mutable
//! graph. Node-level failures are isolated (the node is restored and the task
//! moves on); fatal failures abort the run. The executor itself never
//! returns an error: everything is reported in the [`RunState`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use crate::errors::TaskError;
use crate::exec::cache::{
    node_fingerprint, task_identity, CacheEntry, CacheKey, CacheStore, CachedOutcome,
    MemoryCacheStore,
};
use crate::exec::run_state::{RunState, RunStatus, TaskMetrics};
use crate::scene::{NodeId, SceneGraph};
use crate::task::{BodyOutcome, ExternalContext, Need, TaskContext, TaskRegistry, TaskSpec};

pub struct Executor {
    cache: Box<dyn CacheStore>,
    external: Option<ExternalContext>,
    run_counter: u64,
    generation: u64,
}

impl Executor {
    pub fn new(cache: Box<dyn CacheStore>) -> Self {
        Self {
            cache,
            external: None,
            run_counter: 0,
            generation: 0,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCacheStore::new()))
    }

    pub fn with_external(mut self, external: ExternalContext) -> Self {
        self.external = Some(external);
        self
    }

    pub fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Adopt a registry generation. A new generation drops every cached
    /// entry. The first generation a fresh executor sees keeps what the
    /// store already holds, so a file store survives restarts.
    pub fn sync_generation(&mut self, generation: u64) {
        if generation == self.generation {
            return;
        }
        if self.generation == 0 {
            debug!(to = generation, "executor adopted first generation");
            self.generation = generation;
            return;
        }
        if let Err(err) = self.cache.clear() {
            warn!(error = %err, "failed to clear cache on reload");
        }
        debug!(from = self.generation, to = generation, "executor adopted new generation");
        self.generation = generation;
    }

    /// Run every applicable task once, in order. Assigns the next run id.
    pub fn run(&mut self, graph: &mut SceneGraph, registry: &TaskRegistry) -> RunState {
        self.run_counter += 1;
        let run_id = self.run_counter;
        self.run_with_id(run_id, graph, registry)
    }

    pub fn run_with_id(
        &mut self,
        run_id: u64,
        graph: &mut SceneGraph,
        registry: &TaskRegistry,
    ) -> RunState {
        self.run_counter = self.run_counter.max(run_id);
        let started = Instant::now();
        let mut state = RunState::new(run_id);

        info!(run_id, tasks = registry.len(), "run started");

        for spec in registry.tasks_sorted() {
            if !spec.should_run(&state.data) {
                debug!(run_id, task = %spec.name(), "condition false; skipping task");
                continue;
            }

            if spec.needs_external() && self.external.is_none() {
                let msg = format!(
                    "task '{}' needs the external context but none is configured",
                    spec.name()
                );
                error!(run_id, task = %spec.name(), "{msg}");
                state.abort(spec.name(), msg);
                break;
            }

            let mut metrics = TaskMetrics::new(spec.name(), spec.order().to_string());
            let task_started = Instant::now();

            let result = if spec.is_per_node() {
                self.run_per_node(spec, graph, &mut state, &mut metrics)
            } else {
                self.run_once(spec, graph, &mut state, &mut metrics)
            };

            metrics.elapsed = task_started.elapsed();
            debug!(
                run_id,
                task = %spec.name(),
                order = %spec.order(),
                nodes = metrics.nodes_processed,
                cache_hits = metrics.cache_hits,
                failures = metrics.failures,
                elapsed_ms = metrics.elapsed.as_millis() as u64,
                "task finished"
            );
            state.metrics.push(metrics);

            if let Err(err) = result {
                error!(run_id, task = %spec.name(), error = %err, "run aborted");
                state.abort(spec.name(), err.to_string());
                break;
            }
        }

        state.elapsed = started.elapsed();
        match state.status {
            RunStatus::Completed => info!(run_id, elapsed_ms = state.elapsed.as_millis() as u64, "run completed"),
            RunStatus::Partial => warn!(run_id, failures = state.failures, "run completed with failures"),
            RunStatus::Failed => error!(run_id, last_error = ?state.last_error, "run failed"),
        }
        state
    }

    /// Path-less tasks: one call, no node, never cached. The data map is
    /// restored on a node-level failure, and the graph too when the body
    /// may have touched it.
    fn run_once(
        &mut self,
        spec: &TaskSpec,
        graph: &mut SceneGraph,
        state: &mut RunState,
        metrics: &mut TaskMetrics,
    ) -> Result<(), TaskError> {
        let graph_before = spec.needs().contains(&Need::Root).then(|| graph.clone());
        let data_before = state.data.clone();

        let outcome = {
            let mut ctx = TaskContext::new(
                spec.name(),
                spec.needs(),
                graph,
                None,
                &mut state.data,
                self.external.as_ref(),
                spec.params(),
                spec.log(),
            );
            call_body(spec, &mut ctx)
        };

        match outcome {
            Ok(BodyOutcome::Keep) => Ok(()),
            Ok(_) => Err(TaskError::fatal(format!(
                "task '{}' has no node to remove or replace",
                spec.name()
            ))),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(task = %spec.name(), error = %err, "task failed");
                if let Some(before) = graph_before {
                    *graph = before;
                }
                state.data = data_before;
                metrics.failures += 1;
                state.record_failure(format!("{}: {err}", spec.name()));
                Ok(())
            }
        }
    }

    fn run_per_node(
        &mut self,
        spec: &TaskSpec,
        graph: &mut SceneGraph,
        state: &mut RunState,
        metrics: &mut TaskMetrics,
    ) -> Result<(), TaskError> {
        let targets = spec.resolve_targets(graph);
        let identity = spec.cache().then(|| task_identity(spec));

        trace!(task = %spec.name(), targets = targets.len(), "resolved targets");

        for id in targets {
            let Some(before) = graph.get(id).cloned() else {
                trace!(task = %spec.name(), node = %id, "target removed earlier in this task");
                continue;
            };
            metrics.nodes_processed += 1;

            let key = identity.as_ref().and_then(|ident| match node_fingerprint(&before) {
                Ok(fp) => Some(CacheKey::new(ident.clone(), fp)),
                Err(err) => {
                    warn!(task = %spec.name(), error = %err, "cannot fingerprint node; not caching");
                    None
                }
            });

            if let Some(key) = key.as_ref().filter(|_| !spec.cache_override()) {
                match self.cache.load(key) {
                    Ok(Some(entry)) => {
                        apply_cached(graph, id, entry.outcome)?;
                        metrics.cache_hits += 1;
                        continue;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(task = %spec.name(), error = %err, "ignoring unusable cache entry");
                    }
                }
            }

            let outcome = {
                let mut ctx = TaskContext::new(
                    spec.name(),
                    spec.needs(),
                    graph,
                    Some(id),
                    &mut state.data,
                    self.external.as_ref(),
                    spec.params(),
                    spec.log(),
                );
                call_body(spec, &mut ctx)
            };

            let failure = match outcome {
                Ok(outcome) => match apply_outcome(graph, id, outcome) {
                    Ok(cached) => {
                        if let (Some(key), Some(cached)) = (key, cached) {
                            self.store(&key, cached);
                        }
                        continue;
                    }
                    Err(err) => err,
                },
                Err(err) => err,
            };

            if failure.is_fatal() {
                return Err(failure);
            }

            let path = graph
                .path_of(id)
                .unwrap_or_else(|| format!("<detached {}>", before.name));
            warn!(task = %spec.name(), node = %path, error = %failure, "node failed; restoring");
            restore(graph, id, before);
            metrics.failures += 1;
            state.record_failure(format!("{} at {path}: {failure}", spec.name()));
        }

        Ok(())
    }

    fn store(&mut self, key: &CacheKey, outcome: CachedOutcome) {
        let entry = match CacheEntry::new(key, outcome) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "cannot build cache entry");
                return;
            }
        };
        if let Err(err) = self.cache.save(key, entry) {
            warn!(error = %err, "cannot store cache entry");
        }
    }
}

/// Invoke a body, turning a panic into a node-level failure so the node is
/// restored and the run carries on.
fn call_body(spec: &TaskSpec, ctx: &mut TaskContext<'_>) -> Result<BodyOutcome, TaskError> {
    match panic::catch_unwind(AssertUnwindSafe(|| spec.body().call(ctx))) {
        Ok(result) => result,
        Err(payload) => Err(TaskError::node(format!(
            "task '{}' panicked: {}",
            spec.name(),
            panic_message(payload.as_ref())
        ))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Apply a body outcome to the graph and return what to cache for it.
fn apply_outcome(
    graph: &mut SceneGraph,
    id: NodeId,
    outcome: BodyOutcome,
) -> Result<Option<CachedOutcome>, TaskError> {
    match outcome {
        BodyOutcome::Keep => Ok(graph.get(id).cloned().map(CachedOutcome::Keep)),
        BodyOutcome::Remove => {
            graph.remove(id);
            Ok(Some(CachedOutcome::Remove))
        }
        BodyOutcome::Replace(node) => {
            let cached = node.clone();
            graph
                .replace(id, node)
                .map_err(|_| TaskError::node(format!("node {id} vanished before replacement")))?;
            Ok(Some(CachedOutcome::Replace(cached)))
        }
    }
}

/// Cached nodes are duplicated so their ids are fresh in this graph.
fn apply_cached(graph: &mut SceneGraph, id: NodeId, outcome: CachedOutcome) -> Result<(), TaskError> {
    match outcome {
        CachedOutcome::Remove => {
            graph.remove(id);
            Ok(())
        }
        CachedOutcome::Keep(node) | CachedOutcome::Replace(node) => graph
            .replace(id, node.duplicate())
            .map(|_| ())
            .map_err(|_| TaskError::node(format!("node {id} vanished before cached replacement"))),
    }
}

fn restore(graph: &mut SceneGraph, id: NodeId, before: crate::scene::Node) {
    if graph.replace(id, before).is_err() {
        warn!(node = %id, "node left the graph during a failed call; cannot restore it");
    }
}
