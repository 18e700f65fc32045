// src/exec/mod.rs

//! Execution layer.
//!
//! - [`executor`] runs one pass of the registry over a graph.
//! - [`cache`] stores per-(task, node) outcomes in memory or on disk.
//! - [`run_state`] is what a run reports.
//! - [`backend`] moves runs off the event loop onto a worker thread, behind
//!   a trait tests can replace.

pub mod backend;
pub mod cache;
pub mod executor;
pub mod run_state;

pub use backend::{RunBackend, RunJob, RunOutcome, WorkerBackend};
pub use cache::{build_store, CacheStore, FileCacheStore, MemoryCacheStore};
pub use executor::Executor;
pub use run_state::{RunState, RunStatus, TaskMetrics};
