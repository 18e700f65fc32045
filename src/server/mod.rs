// src/server/mod.rs

//! Dev server: TCP sessions speaking newline-delimited JSON, backed by the
//! committed snapshot in [`StatusBoard`] and fanned out through [`Hub`].

pub mod hub;
pub mod listener;
pub mod protocol;
pub mod status;

pub use hub::Hub;
pub use listener::spawn_listener;
pub use protocol::{ClientRequest, ResultPayload, ServerMessage, StatusPayload, TaskStatus};
pub use status::StatusBoard;
