// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::ServerEvent;
use crate::fs::FileSystem;
use crate::watch::coalesce::Coalescer;
use crate::watch::hash::SourceHashes;
use crate::watch::patterns::{relative_str, SourceFilter};

/// Keeps the underlying `notify` watcher alive. Dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

pub struct WatchOptions {
    pub root: PathBuf,
    pub filter: SourceFilter,
    pub debounce: Duration,
    /// Files whose current content should not count as a change.
    pub known_sources: Vec<PathBuf>,
}

/// Watch `root` recursively and send one `ServerEvent::SourceChanged` per
/// debounced batch of real content changes to definition sources.
pub fn spawn_watcher(
    options: WatchOptions,
    fs: Arc<dyn FileSystem>,
    runtime_tx: mpsc::Sender<ServerEvent>,
) -> Result<WatcherHandle> {
    let WatchOptions {
        root,
        filter,
        debounce,
        known_sources,
    } = options;
    let root = fs.canonicalize(&root).unwrap_or(root);

    // The notify callback runs on notify's own thread; it only forwards.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("scenepipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("scenepipe: file watch error: {err}"),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, debounce_ms = debounce.as_millis() as u64, "file watcher started");

    let mut hashes = SourceHashes::new();
    let known: Vec<PathBuf> = known_sources
        .iter()
        .map(|p| fs.canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect();
    hashes.prime(fs.as_ref(), known.iter());

    tokio::spawn(async move {
        let mut coalescer = Coalescer::new(debounce);

        loop {
            let deadline = coalescer.deadline();
            tokio::select! {
                maybe = event_rx.recv() => {
                    let Some(event) = maybe else { break };
                    if !is_content_event(&event.kind) {
                        continue;
                    }
                    for path in event.paths {
                        let Some(rel) = relative_str(&root, &path) else { continue };
                        if filter.matches(&rel) {
                            debug!(path = %rel, kind = ?event.kind, "source event");
                            coalescer.push(path, Instant::now());
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    let Some(batch) = coalescer.ready(Instant::now()) else { continue };
                    let changed: Vec<PathBuf> = batch
                        .into_iter()
                        .filter(|p| hashes.observe(fs.as_ref(), p))
                        .collect();
                    let Some(path) = changed.first().cloned() else {
                        debug!("batch had no content changes");
                        continue;
                    };
                    info!(path = ?path, files = changed.len(), "definition sources changed");
                    if runtime_tx.send(ServerEvent::SourceChanged { path }).await.is_err() {
                        warn!("runtime gone; stopping watcher");
                        break;
                    }
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

fn is_content_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending::<()>().await,
    }
}
