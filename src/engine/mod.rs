// src/engine/mod.rs

//! Live-reload engine.
//!
//! The pure state machine lives in [`core`] (with its handlers in
//! [`event_handlers`]); the async IO shell that reloads definitions, starts
//! runs and publishes results is [`runtime`].
//!
//! ```text
//! Idle --(startup | source changed)--> Loading --(reload ok)--> Running
//!   ^                                     |                        |
//!   +----------(reload failed)------------+                        |
//!   +----------------------(run finished, nothing pending)---------+
//! ```
//!
//! Triggers arriving outside `Idle` collapse into a single pending rerun.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::exec::RunOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerPhase {
    Idle,
    Loading,
    Running,
}

/// Options shared by the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Stop once idle with nothing pending (used for `--once`).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the watcher, the worker and signals.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    StartupRequested,
    /// A definition file changed (already debounced and deduplicated).
    SourceChanged { path: PathBuf },
    /// The shell finished reloading; `Ok` carries the task count.
    ReloadFinished { result: Result<usize, String> },
    RunFinished(Arc<RunOutcome>),
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod pending;
pub mod runtime;

pub use core::CoreServer;
pub use event_handlers::{CoreCommand, CoreStep};
pub use pending::PendingRerun;
pub use runtime::Runtime;
