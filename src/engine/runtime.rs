// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::{PipelineError, Result};
use crate::exec::{RunBackend, RunJob};
use crate::scene::SceneGraph;
use crate::server::{Hub, ServerMessage, StatusBoard};
use crate::task::{RegistrySource, TaskRegistry};

use super::core::CoreServer;
use super::{CoreCommand, ServerEvent};

/// Async IO shell around [`CoreServer`].
///
/// It owns the registry source, the input graph and the current registry,
/// reads events from the channel, feeds them to the core and carries out the
/// resulting commands: reloading, handing runs to the backend, committing
/// snapshots and pushing results to sessions.
pub struct Runtime<B: RunBackend> {
    core: CoreServer,
    event_rx: mpsc::Receiver<ServerEvent>,
    backend: B,
    source: Box<dyn RegistrySource>,
    board: Arc<StatusBoard>,
    hub: Option<Hub>,
    input: SceneGraph,
    registry: Option<Arc<TaskRegistry>>,
    generation: u64,
}

impl<B: RunBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<B: RunBackend> Runtime<B> {
    pub fn new(
        core: CoreServer,
        event_rx: mpsc::Receiver<ServerEvent>,
        backend: B,
        source: Box<dyn RegistrySource>,
        board: Arc<StatusBoard>,
        input: SceneGraph,
    ) -> Self {
        Self {
            core,
            event_rx,
            backend,
            source,
            board,
            hub: None,
            input,
            registry: None,
            generation: 0,
        }
    }

    /// Push results to the sessions of `hub` after every run.
    pub fn with_hub(mut self, hub: Hub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Main event loop. Returns when the core asks to stop or every event
    /// sender is gone.
    pub async fn run(mut self) -> Result<()> {
        info!(script = %self.source.script(), "scenepipe runtime started");

        let mut queue: VecDeque<ServerEvent> = VecDeque::new();
        'outer: loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };
            queue.push_back(event);

            // Reloads happen inline and report back through the queue.
            while let Some(event) = queue.pop_front() {
                debug!(?event, "runtime received event");
                let step = self.core.step(event);

                for command in step.commands {
                    if let Some(follow_up) = self.execute_command(command).await? {
                        queue.push_back(follow_up);
                    }
                }
                self.board.set_phase(self.core.phase());

                if !step.keep_running {
                    info!("core requested exit; stopping runtime");
                    break 'outer;
                }
            }
        }

        info!("runtime exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<ServerEvent>> {
        match command {
            CoreCommand::Reload => Ok(Some(self.reload())),
            CoreCommand::StartRun { run_id } => {
                self.start_run(run_id).await?;
                Ok(None)
            }
            CoreCommand::Commit(outcome) => {
                info!(
                    run_id = outcome.run_id,
                    status = ?outcome.state.status,
                    failures = outcome.state.failures,
                    "committing run"
                );
                self.board.commit(outcome);
                Ok(None)
            }
            CoreCommand::PublishResult { run_id } => {
                if let Some(hub) = &self.hub {
                    let delivered = hub.broadcast(&ServerMessage::Result(self.board.result())).await;
                    debug!(run_id, delivered, "published result");
                }
                Ok(None)
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
                Ok(None)
            }
        }
    }

    /// Rebuild the registry from scratch. On failure the previous registry
    /// stays in place and the error is surfaced in status.
    fn reload(&mut self) -> ServerEvent {
        match self.source.reload() {
            Ok(registry) => {
                self.generation += 1;
                let tasks = registry.len();
                self.board.set_registry(&registry);
                self.board.set_reload_error(None);
                self.registry = Some(Arc::new(registry));
                info!(generation = self.generation, tasks, "registry reloaded");
                ServerEvent::ReloadFinished { result: Ok(tasks) }
            }
            Err(err) => {
                let msg = err.to_string();
                error!(error = %msg, "reload failed");
                self.board.set_reload_error(Some(msg.clone()));
                ServerEvent::ReloadFinished { result: Err(msg) }
            }
        }
    }

    async fn start_run(&mut self, run_id: u64) -> Result<()> {
        let Some(registry) = self.registry.clone() else {
            warn!(run_id, "run requested without a registry");
            return Err(PipelineError::Watcher("no registry loaded".into()));
        };

        let job = RunJob {
            run_id,
            generation: self.generation,
            registry,
            graph: self.input.clone(),
        };
        debug!(run_id, generation = self.generation, "starting run");
        self.backend.start_run(job).await
    }
}
