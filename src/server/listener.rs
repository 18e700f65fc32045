// src/server/listener.rs

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::server::hub::Hub;
use crate::server::protocol::{decode_request, ClientRequest, ServerMessage};
use crate::server::status::StatusBoard;

/// Bind `addr` and accept sessions in the background. Returns the bound
/// address (useful with port 0).
pub async fn spawn_listener(addr: &str, hub: Hub, board: Arc<StatusBoard>) -> Result<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "dev server listening");

    tokio::spawn(async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };
            let hub = hub.clone();
            let board = Arc::clone(&board);
            tokio::spawn(async move {
                if let Err(err) = handle_session(stream, hub, board).await {
                    warn!(%peer, error = %err, "session error");
                }
            });
        }
    });

    Ok(local)
}

async fn handle_session(stream: TcpStream, hub: Hub, board: Arc<StatusBoard>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let (conn_id, mut outbox) = hub.register().await;

    let writer_task = tokio::spawn(async move {
        while let Some(line) = outbox.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match decode_request(&line) {
            Ok(ClientRequest::StatusGet) => ServerMessage::Status(board.status()),
            Ok(ClientRequest::ResultGet) => ServerMessage::Result(board.result()),
            Err(err) => ServerMessage::Error {
                message: format!("malformed request: {err}"),
            },
        };
        debug!(conn = conn_id, "answering request");
        if !hub.send_to(conn_id, &reply).await {
            break;
        }
    }

    // Unregistering drops the outbox sender, so the writer drains and stops.
    hub.unregister(conn_id).await;
    let _ = writer_task.await;
    debug!(conn = conn_id, "session closed");
    Ok(())
}
