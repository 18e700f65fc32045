// src/engine/core.rs

//! Pure live-reload state machine.
//!
//! [`CoreServer::step`] consumes one [`ServerEvent`] and returns the commands
//! the IO shell (`engine::runtime::Runtime`) should execute. No channels,
//! no Tokio, no filesystem: everything here is unit-testable.

use crate::engine::event_handlers::{
    handle_reload_finished, handle_run_finished, handle_trigger, CoreStep,
};
use crate::engine::pending::PendingRerun;
use crate::engine::{RuntimeOptions, ServerEvent, ServerPhase};

#[derive(Debug)]
pub struct CoreServer {
    pub(crate) phase: ServerPhase,
    pub(crate) pending: PendingRerun,
    pub(crate) run_counter: u64,
    pub(crate) current_run: Option<u64>,
    pub(crate) options: RuntimeOptions,
}

impl CoreServer {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            phase: ServerPhase::Idle,
            pending: PendingRerun::new(),
            run_counter: 0,
            current_run: None,
            options,
        }
    }

    pub fn phase(&self) -> ServerPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == ServerPhase::Idle
    }

    pub fn has_pending_rerun(&self) -> bool {
        self.pending.is_pending()
    }

    pub fn current_run(&self) -> Option<u64> {
        self.current_run
    }

    pub fn step(&mut self, event: ServerEvent) -> CoreStep {
        match event {
            ServerEvent::StartupRequested => handle_trigger(self, None),
            ServerEvent::SourceChanged { path } => handle_trigger(self, Some(path)),
            ServerEvent::ReloadFinished { result } => handle_reload_finished(self, result),
            ServerEvent::RunFinished(outcome) => handle_run_finished(self, outcome),
            ServerEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
