// src/exec/run_state.rs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};
use crate::scene::Attributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every task ran and no node failed.
    Completed,
    /// The run finished but at least one node failed and was restored.
    Partial,
    /// A fatal error aborted the run.
    Failed,
}

/// Per-task counters for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMetrics {
    pub name: String,
    pub order: String,
    pub elapsed: Duration,
    pub nodes_processed: usize,
    pub cache_hits: usize,
    pub failures: usize,
}

impl TaskMetrics {
    pub(crate) fn new(name: &str, order: String) -> Self {
        Self {
            name: name.to_string(),
            order,
            elapsed: Duration::ZERO,
            nodes_processed: 0,
            cache_hits: 0,
            failures: 0,
        }
    }
}

/// Everything a run reports besides the output graph.
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: u64,
    pub status: RunStatus,
    /// Shared data map tasks read and write during the run.
    pub data: Attributes,
    /// Metrics of tasks that ran, in execution order.
    pub metrics: Vec<TaskMetrics>,
    pub failures: usize,
    pub last_error: Option<String>,
    /// Task that aborted the run, for `Failed`.
    pub aborted_in: Option<String>,
    pub elapsed: Duration,
}

impl RunState {
    pub(crate) fn new(run_id: u64) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            data: Attributes::new(),
            metrics: Vec::new(),
            failures: 0,
            last_error: None,
            aborted_in: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn metrics_for(&self, task: &str) -> Option<&TaskMetrics> {
        self.metrics.iter().find(|m| m.name == task)
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }

    /// `Err(RunAborted)` for a failed run.
    pub fn check(&self) -> Result<()> {
        if !self.is_failed() {
            return Ok(());
        }
        Err(PipelineError::RunAborted {
            task: self.aborted_in.clone().unwrap_or_default(),
            reason: self.last_error.clone().unwrap_or_default(),
        })
    }

    pub(crate) fn record_failure(&mut self, err: String) {
        self.failures += 1;
        self.last_error = Some(err);
        if self.status == RunStatus::Completed {
            self.status = RunStatus::Partial;
        }
    }

    /// A run that failed before producing anything.
    pub(crate) fn aborted(run_id: u64, task: &str, err: String) -> Self {
        let mut state = Self::new(run_id);
        state.abort(task, err);
        state
    }

    pub(crate) fn abort(&mut self, task: &str, err: String) {
        self.status = RunStatus::Failed;
        self.aborted_in = Some(task.to_string());
        self.last_error = Some(err);
    }
}
