use serde::Deserialize;

/// Where the executor keeps per-(task, node) cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorageMode {
    /// Store entries as JSON files under `.scenepipe/cache`.
    File,
    /// Store entries in memory only (lost on restart).
    Memory,
}

impl Default for CacheStorageMode {
    fn default() -> Self {
        CacheStorageMode::Memory
    }
}
