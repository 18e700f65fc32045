// src/server/hub.rs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::server::protocol::{encode, ServerMessage};

/// Outbox depth per session.
const OUTBOX_CAPACITY: usize = 64;

struct SessionState {
    tx: mpsc::Sender<String>,
}

#[derive(Default)]
struct HubState {
    next_conn_id: u64,
    sessions: HashMap<u64, SessionState>,
}

/// Registry of connected sessions. Each session has an outbox drained by its
/// own writer task; the hub only ever pushes encoded lines into outboxes.
#[derive(Clone, Default)]
pub struct Hub {
    state: Arc<Mutex<HubState>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a session id and its outbox receiver.
    pub async fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let mut h = self.state.lock().await;
        let id = h.next_conn_id;
        h.next_conn_id += 1;
        h.sessions.insert(id, SessionState { tx });
        debug!(conn = id, "session registered");
        (id, rx)
    }

    pub async fn unregister(&self, conn_id: u64) {
        if self.state.lock().await.sessions.remove(&conn_id).is_some() {
            debug!(conn = conn_id, "session unregistered");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn send_to(&self, conn_id: u64, message: &ServerMessage) -> bool {
        let line = match encode(message) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "cannot encode message");
                return false;
            }
        };
        let tx = {
            let h = self.state.lock().await;
            match h.sessions.get(&conn_id) {
                Some(s) => s.tx.clone(),
                None => return false,
            }
        };
        tx.send(line).await.is_ok()
    }

    /// Push `message` to every session. Sessions whose outbox is full or
    /// closed are dropped.
    pub async fn broadcast(&self, message: &ServerMessage) -> usize {
        let line = match encode(message) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "cannot encode broadcast");
                return 0;
            }
        };

        let mut h = self.state.lock().await;
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, session) in &h.sessions {
            match session.tx.try_send(line.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(conn = id, error = %err, "dropping slow or closed session");
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            h.sessions.remove(&id);
        }
        delivered
    }
}
