// src/errors.rs

//! Crate-wide error types.
//!
//! [`PipelineError`] covers everything that can go wrong while loading,
//! registering or running a pipeline. [`TaskError`] is what task bodies
//! return; the executor decides per variant whether a failure stays local to
//! one node or aborts the whole run.

use thiserror::Error;

use crate::scene::GeometryError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid order key '{key}': {reason}")]
    InvalidOrder { key: String, reason: String },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid path pattern '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Wildcard scope conflict: {0}")]
    WildcardConflict(String),

    #[error("Include cycle detected: {0}")]
    IncludeCycle(String),

    #[error("Run aborted in task '{task}': {reason}")]
    RunAborted { task: String, reason: String },

    #[error("Cache entry corrupted: {0}")]
    CacheCorruption(String),

    #[error("Reload failed: {0}")]
    Watcher(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// True for the error kinds that must stop a pipeline before any task runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::ConfigError(_)
                | PipelineError::InvalidOrder { .. }
                | PipelineError::InvalidSelector { .. }
                | PipelineError::InvalidPath { .. }
                | PipelineError::WildcardConflict(_)
                | PipelineError::IncludeCycle(_)
        )
    }
}

/// Failure reported by a task body.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Processing one node failed; the node is restored and the task goes on.
    #[error("{0}")]
    Node(String),

    /// The geometry engine rejected its input; handled like `Node`.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Malformed task configuration or missing context; aborts the run.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl TaskError {
    pub fn node(msg: impl Into<String>) -> Self {
        TaskError::Node(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        TaskError::Fatal(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::Fatal(_))
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Node(format!("{err:#}"))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
