// src/exec/backend.rs

//! Pluggable run backend.
//!
//! The runtime talks to a [`RunBackend`] instead of the executor directly.
//! Production uses [`WorkerBackend`], which runs the executor on a dedicated
//! worker thread and reports back with a `RunFinished` event. Tests can plug
//! in a backend that records jobs and answers without running anything.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::engine::ServerEvent;
use crate::errors::{PipelineError, Result};
use crate::exec::executor::{panic_message, Executor};
use crate::exec::run_state::{RunState, RunStatus};
use crate::scene::SceneGraph;
use crate::task::TaskRegistry;

/// Everything one run needs. The graph is a private copy of the input.
#[derive(Debug)]
pub struct RunJob {
    pub run_id: u64,
    pub generation: u64,
    pub registry: Arc<TaskRegistry>,
    pub graph: SceneGraph,
}

/// What a finished run hands back to the event loop.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: u64,
    pub state: RunState,
    /// Exported graph, absent when the run failed.
    pub graph_json: Option<serde_json::Value>,
}

impl RunOutcome {
    pub fn from_run(run_id: u64, state: RunState, graph: &SceneGraph) -> Self {
        let graph_json = if state.status == RunStatus::Failed {
            None
        } else {
            match graph.to_json() {
                Ok(json) => Some(json),
                Err(err) => {
                    error!(run_id, error = %err, "failed to export run result");
                    None
                }
            }
        };
        Self {
            run_id,
            state,
            graph_json,
        }
    }
}

pub trait RunBackend: Send {
    /// Start `job`. Completion is reported asynchronously as
    /// `ServerEvent::RunFinished`; this only fails if the job could not be
    /// started at all.
    fn start_run(&mut self, job: RunJob) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Runs each job on a fresh named worker thread. At most one run is in
/// flight because the engine never starts a run while another is active.
pub struct WorkerBackend {
    executor: Arc<Mutex<Executor>>,
    runtime_tx: mpsc::Sender<ServerEvent>,
}

impl WorkerBackend {
    pub fn new(executor: Executor, runtime_tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            executor: Arc::new(Mutex::new(executor)),
            runtime_tx,
        }
    }
}

impl RunBackend for WorkerBackend {
    fn start_run(&mut self, job: RunJob) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let executor = Arc::clone(&self.executor);
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            let run_id = job.run_id;
            thread::Builder::new()
                .name(format!("scenepipe-run-{run_id}"))
                .spawn(move || {
                    let RunJob {
                        run_id,
                        generation,
                        registry,
                        mut graph,
                    } = job;

                    let ran = panic::catch_unwind(AssertUnwindSafe(|| {
                        let mut executor = executor.lock().unwrap_or_else(|p| p.into_inner());
                        executor.sync_generation(generation);
                        executor.run_with_id(run_id, &mut graph, &registry)
                    }));
                    let state = ran.unwrap_or_else(|payload| {
                        let msg = format!("worker panicked: {}", panic_message(payload.as_ref()));
                        error!(run_id, "{msg}");
                        RunState::aborted(run_id, "<worker>", msg)
                    });

                    let outcome = RunOutcome::from_run(run_id, state, &graph);
                    if tx
                        .blocking_send(ServerEvent::RunFinished(Arc::new(outcome)))
                        .is_err()
                    {
                        debug!(run_id, "runtime gone; dropping run result");
                    }
                })
                .map_err(PipelineError::IoError)?;
            debug!(run_id, "spawned worker thread");
            Ok(())
        })
    }
}
