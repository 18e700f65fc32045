// src/config/model.rs

use serde::Deserialize;

use crate::types::CacheStorageMode;

/// One pipeline definition file.
///
/// ```toml
/// include = ["common/groups.toml"]
///
/// [config]
/// name = "osm base"
/// listen = "127.0.0.1:8085"
///
/// [[task]]
/// name = "Tag buildings"
/// order = "20.+"
/// path = "/Features/*"
/// select = '[building]'
/// body = "attr.set"
/// params = { attrs = { kind = "building" } }
/// ```
///
/// Only the entry file's `[config]` is honoured; includes may carry tasks
/// and further includes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionFile {
    /// Paths relative to this file.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub config: Option<ServerSection>,

    #[serde(default)]
    pub task: Vec<TaskDef>,
}

/// `[config]` section of the entry file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub cache_storage: CacheStorageMode,

    /// Debounce window for source changes, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// File extensions that count as definition sources.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Globs (relative to the pipeline root) ignored by the watcher.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_listen() -> String {
    "127.0.0.1:8085".to_string()
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_extensions() -> Vec<String> {
    vec!["toml".to_string()]
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: None,
            listen: default_listen(),
            cache_storage: CacheStorageMode::default(),
            debounce_ms: default_debounce_ms(),
            extensions: default_extensions(),
            exclude: Vec::new(),
        }
    }
}

/// One `[[task]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDef {
    pub name: String,

    /// Name of a body in the body library.
    pub body: String,

    #[serde(default)]
    pub order: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    /// Selector over node attributes.
    #[serde(default)]
    pub select: Option<String>,

    /// Extra selector over node attributes, applied after `select`.
    #[serde(default)]
    pub filter: Option<String>,

    /// Selector over the shared data map; the task is skipped when false.
    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub cache: bool,

    #[serde(default)]
    pub cache_override: bool,

    #[serde(default)]
    pub recurse: bool,

    #[serde(default)]
    pub log: bool,

    #[serde(default)]
    pub params: toml::Table,
}
