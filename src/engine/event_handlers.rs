// src/engine/event_handlers.rs

//! Event handling logic for the core server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::core::CoreServer;
use crate::engine::ServerPhase;
use crate::exec::RunOutcome;

/// Command produced by the pure core, executed by the IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Evict loaded modules, re-read the definition tree, rebuild the
    /// registry, then report back with `ReloadFinished`.
    Reload,
    /// Hand a fresh copy of the input graph and the current registry to the
    /// run backend.
    StartRun { run_id: u64 },
    /// Make a finished run the committed snapshot for status queries.
    Commit(Arc<RunOutcome>),
    /// Push the committed result to every connected session.
    PublishResult { run_id: u64 },
    /// Stop the process (used for `--once`).
    RequestExit,
}

#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Startup or a changed source file.
///
/// From `Idle` a reload starts right away. Anywhere else the trigger is
/// folded into the pending rerun; an in-flight run is never interrupted.
pub fn handle_trigger(core: &mut CoreServer, path: Option<PathBuf>) -> CoreStep {
    if core.phase == ServerPhase::Idle {
        debug!(?path, "trigger while idle; reloading");
        core.phase = ServerPhase::Loading;
        return CoreStep::continue_with(vec![CoreCommand::Reload]);
    }

    debug!(?path, phase = ?core.phase, "trigger while busy; pending rerun");
    core.pending.record(path);
    CoreStep::continue_with(Vec::new())
}

pub fn handle_reload_finished(core: &mut CoreServer, result: Result<usize, String>) -> CoreStep {
    if core.phase != ServerPhase::Loading {
        warn!(phase = ?core.phase, "reload result outside Loading; ignoring");
        return CoreStep::continue_with(Vec::new());
    }

    match result {
        Ok(tasks) => {
            core.run_counter += 1;
            let run_id = core.run_counter;
            core.current_run = Some(run_id);
            core.phase = ServerPhase::Running;
            info!(run_id, tasks, "definitions loaded; starting run");
            CoreStep::continue_with(vec![CoreCommand::StartRun { run_id }])
        }
        Err(err) => {
            warn!(error = %err, "reload failed; keeping previous registry");
            core.phase = ServerPhase::Idle;
            settle_idle(core)
        }
    }
}

pub fn handle_run_finished(core: &mut CoreServer, outcome: Arc<RunOutcome>) -> CoreStep {
    if core.current_run != Some(outcome.run_id) {
        debug!(
            run_id = outcome.run_id,
            current = ?core.current_run,
            "completion for a run that is not current; ignoring"
        );
        return CoreStep::continue_with(Vec::new());
    }

    let run_id = outcome.run_id;
    core.current_run = None;
    core.phase = ServerPhase::Idle;

    let mut step = settle_idle(core);
    let mut commands = vec![
        CoreCommand::Commit(outcome),
        CoreCommand::PublishResult { run_id },
    ];
    commands.append(&mut step.commands);
    step.commands = commands;
    step
}

/// Back in `Idle`: either start the pending rerun or, in `--once` mode,
/// ask to exit.
fn settle_idle(core: &mut CoreServer) -> CoreStep {
    if core.pending.is_pending() {
        debug!(
            coalesced = core.pending.coalesced(),
            last_path = ?core.pending.last_path(),
            "starting pending rerun"
        );
        core.pending.take();
        core.phase = ServerPhase::Loading;
        return CoreStep::continue_with(vec![CoreCommand::Reload]);
    }

    if core.options.exit_when_idle {
        return CoreStep {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        };
    }

    CoreStep::continue_with(Vec::new())
}
