// src/config/mod.rs

//! TOML pipeline definitions: the file model, the module cache, validation,
//! and the loader that turns a definition tree into a task registry.

pub mod loader;
pub mod model;
pub mod modules;
pub mod validate;

pub use loader::{DefinitionLoader, LoadedPipeline};
pub use model::{DefinitionFile, ServerSection, TaskDef};
pub use modules::{CachedModule, ModuleCache};
