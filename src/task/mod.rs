// src/task/mod.rs

//! Task declarations, bodies and the registry.

pub mod body;
pub mod builtin;
pub mod registry;
pub mod spec;

pub use body::{body_fn, BodyOutcome, ExternalContext, Need, TaskBody, TaskContext, TaskLogger};
pub use builtin::BodyLibrary;
pub use registry::{RegistrySource, TaskRegistry};
pub use spec::{NodeFilter, RunCondition, TaskDecl, TaskSpec};
