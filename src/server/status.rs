// src/server/status.rs

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::engine::ServerPhase;
use crate::exec::RunOutcome;
use crate::server::protocol::{ResultPayload, RunSummary, StatusPayload, TaskStatus};
use crate::task::TaskRegistry;

#[derive(Debug)]
struct BoardState {
    script: String,
    phase: ServerPhase,
    tasks: Vec<TaskStatus>,
    /// Tasks of a reloaded registry whose run has not committed yet.
    staged: Option<Vec<TaskStatus>>,
    reload_error: Option<String>,
    committed: Option<Arc<RunOutcome>>,
}

/// Committed snapshot served to sessions.
///
/// Only the event loop writes; sessions read. Nothing here points into a
/// graph that is being mutated, so a query during a run sees the previous
/// committed run.
#[derive(Debug)]
pub struct StatusBoard {
    inner: RwLock<BoardState>,
}

impl StatusBoard {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(BoardState {
                script: script.into(),
                phase: ServerPhase::Idle,
                tasks: Vec::new(),
                staged: None,
                reload_error: None,
                committed: None,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BoardState> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BoardState> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_phase(&self, phase: ServerPhase) {
        self.write().phase = phase;
    }

    pub fn phase(&self) -> ServerPhase {
        self.read().phase
    }

    /// Record the tasks of a freshly loaded registry. Once a run has been
    /// committed they are only published together with the next commit, so
    /// the task list always matches the committed metrics.
    pub fn set_registry(&self, registry: &TaskRegistry) {
        let tasks = registry
            .tasks_sorted()
            .into_iter()
            .map(|t| TaskStatus {
                name: t.name().to_string(),
                order: t.declared_order().to_string(),
                order_resolved: t.order().to_string(),
                path: t.path().map(|p| p.as_str().to_string()),
                selector: t.selector().map(|s| s.as_str().to_string()),
                filter: t.has_filter(),
                condition: t.has_condition(),
                recurse: t.recurse(),
                cache: t.cache(),
                cache_override: t.cache_override(),
                params: t.params().clone(),
                run_seconds: None,
                run_selected: None,
            })
            .collect();
        let mut st = self.write();
        if st.committed.is_some() {
            st.staged = Some(tasks);
        } else {
            st.tasks = tasks;
        }
    }

    pub fn set_reload_error(&self, err: Option<String>) {
        self.write().reload_error = err;
    }

    pub fn commit(&self, outcome: Arc<RunOutcome>) {
        let mut st = self.write();
        if let Some(tasks) = st.staged.take() {
            st.tasks = tasks;
        }
        st.committed = Some(outcome);
    }

    pub fn committed_run(&self) -> Option<u64> {
        self.read().committed.as_ref().map(|o| o.run_id)
    }

    pub fn committed(&self) -> Option<Arc<RunOutcome>> {
        self.read().committed.clone()
    }

    pub fn reload_error(&self) -> Option<String> {
        self.read().reload_error.clone()
    }

    pub fn status(&self) -> StatusPayload {
        let st = self.read();
        let committed = st.committed.as_deref();

        let tasks = st
            .tasks
            .iter()
            .map(|t| {
                let mut t = t.clone();
                if let Some(m) = committed.and_then(|o| o.state.metrics_for(&t.name)) {
                    t.run_seconds = Some(m.elapsed.as_secs_f64());
                    t.run_selected = Some(m.nodes_processed);
                }
                t
            })
            .collect();

        StatusPayload {
            script: st.script.clone(),
            phase: st.phase,
            run: committed.map(|o| RunSummary {
                run_id: o.run_id,
                status: o.state.status,
                failures: o.state.failures,
                last_error: o.state.last_error.clone(),
                elapsed_seconds: o.state.elapsed.as_secs_f64(),
            }),
            reload_error: st.reload_error.clone(),
            data: committed.map(|o| o.state.data.clone()).unwrap_or_default(),
            tasks,
        }
    }

    pub fn result(&self) -> ResultPayload {
        let st = self.read();
        match st.committed.as_deref() {
            Some(o) => ResultPayload {
                run_id: Some(o.run_id),
                data: o.graph_json.clone(),
            },
            None => ResultPayload {
                run_id: None,
                data: None,
            },
        }
    }
}
