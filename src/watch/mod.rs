// src/watch/mod.rs

//! Watching the definition tree.
//!
//! `notify` events are filtered to definition sources ([`patterns`]),
//! debounced ([`coalesce`]) and deduplicated by content hash ([`hash`]) so
//! that one save yields exactly one `SourceChanged` event. The watcher knows
//! nothing about tasks; deciding what to do with a change is the engine's
//! job.

pub mod coalesce;
pub mod hash;
pub mod patterns;
pub mod watcher;

pub use coalesce::Coalescer;
pub use hash::{compute_file_hash, SourceHashes};
pub use patterns::{relative_str, SourceFilter};
pub use watcher::{spawn_watcher, WatchOptions, WatcherHandle};
