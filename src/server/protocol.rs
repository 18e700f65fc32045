// src/server/protocol.rs

//! Dev-server wire protocol: one JSON object per line, in both directions.
//!
//! Requests:  `{"type":"status_get"}`, `{"type":"result_get"}`
//! Replies:   `{"type":"status",...}`, `{"type":"result",...}`,
//!            `{"type":"error","message":...}`

use serde::{Deserialize, Serialize};

use crate::engine::ServerPhase;
use crate::errors::Result;
use crate::exec::RunStatus;
use crate::scene::Attributes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    StatusGet,
    ResultGet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status(StatusPayload),
    Result(ResultPayload),
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub script: String,
    pub phase: ServerPhase,
    /// Summary of the last committed run.
    pub run: Option<RunSummary>,
    /// Error of the most recent reload, if it failed.
    pub reload_error: Option<String>,
    /// Shared data map of the last committed run.
    pub data: Attributes,
    pub tasks: Vec<TaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub status: RunStatus,
    pub failures: usize,
    pub last_error: Option<String>,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub name: String,
    /// Order as declared, wildcards included.
    pub order: String,
    pub order_resolved: String,
    pub path: Option<String>,
    pub selector: Option<String>,
    pub filter: bool,
    pub condition: bool,
    pub recurse: bool,
    pub cache: bool,
    pub cache_override: bool,
    pub params: Attributes,
    /// Elapsed seconds in the last committed run; `None` if it did not run.
    pub run_seconds: Option<f64>,
    /// Nodes processed in the last committed run.
    pub run_selected: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub run_id: Option<u64>,
    /// Exported graph, `null` before the first successful run.
    pub data: Option<serde_json::Value>,
}

/// Serialize one message as a single line, newline included.
pub fn encode(message: &ServerMessage) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_request(line: &str) -> Result<ClientRequest> {
    Ok(serde_json::from_str(line.trim())?)
}
