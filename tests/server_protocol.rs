// tests/server_protocol.rs

mod common;

use std::error::Error;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::common::builders::{feature_graph, tagging_body};
use crate::common::{init_tracing, with_timeout};
use scenepipe::engine::ServerPhase;
use scenepipe::exec::RunOutcome;
use scenepipe::order::OrderKey;
use scenepipe::selector::PathPattern;
use scenepipe::server::{spawn_listener, Hub, ServerMessage, StatusBoard};
use scenepipe::task::{TaskDecl, TaskRegistry};

type TestResult = Result<(), Box<dyn Error>>;

fn registry() -> TaskRegistry {
    let (tag, _) = tagging_body("seen", "yes");
    let mut registry = TaskRegistry::new();
    registry
        .register(
            TaskDecl::new("tag", tag)
                .order(OrderKey::parse("10.+").unwrap())
                .path(PathPattern::parse("/Features/*").unwrap())
                .cache(true),
        )
        .unwrap();
    registry
}

struct Client {
    lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Result<Self, Box<dyn Error>> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    async fn request(&mut self, line: &str) -> Result<serde_json::Value, Box<dyn Error>> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.next().await
    }

    async fn next(&mut self) -> Result<serde_json::Value, Box<dyn Error>> {
        let line = with_timeout(self.lines.next_line()).await?.ok_or("connection closed")?;
        Ok(serde_json::from_str(&line)?)
    }
}

async fn serve() -> Result<(Hub, Arc<StatusBoard>, std::net::SocketAddr), Box<dyn Error>> {
    let hub = Hub::new();
    let board = Arc::new(StatusBoard::new("demo/pipeline.toml"));
    board.set_registry(&registry());
    let addr = spawn_listener("127.0.0.1:0", hub.clone(), Arc::clone(&board)).await?;
    Ok((hub, board, addr))
}

#[tokio::test]
async fn status_before_any_run() -> TestResult {
    init_tracing();
    let (_hub, _board, addr) = serve().await?;
    let mut client = Client::connect(addr).await?;

    let status = client.request(r#"{"type":"status_get"}"#).await?;
    assert_eq!(status["type"], "status");
    assert_eq!(status["script"], "demo/pipeline.toml");
    assert_eq!(status["phase"], "idle");
    assert!(status["run"].is_null());

    let task = &status["tasks"][0];
    assert_eq!(task["name"], "tag");
    assert_eq!(task["order"], "10.+");
    assert_eq!(task["order_resolved"], "10.1");
    assert_eq!(task["path"], "/Features/*");
    assert_eq!(task["cache"], true);
    assert!(task["run_seconds"].is_null());

    let result = client.request(r#"{"type":"result_get"}"#).await?;
    assert_eq!(result["type"], "result");
    assert!(result["run_id"].is_null());
    assert!(result["data"].is_null());
    Ok(())
}

#[tokio::test]
async fn committed_run_is_reported_and_pushed() -> TestResult {
    init_tracing();
    let (hub, board, addr) = serve().await?;
    let mut client = Client::connect(addr).await?;
    // Round-trip once so the session is registered before the push.
    client.request(r#"{"type":"status_get"}"#).await?;

    let (graph, state) = scenepipe::run(feature_graph(), &registry());
    board.commit(Arc::new(RunOutcome::from_run(1, state, &graph)));
    board.set_phase(ServerPhase::Idle);
    let delivered = hub.broadcast(&ServerMessage::Result(board.result())).await;
    assert_eq!(delivered, 1);

    let pushed = client.next().await?;
    assert_eq!(pushed["type"], "result");
    assert_eq!(pushed["run_id"], 1);
    assert_eq!(pushed["data"]["children"][0]["name"], "Features");

    let status = client.request(r#"{"type":"status_get"}"#).await?;
    assert_eq!(status["run"]["run_id"], 1);
    assert_eq!(status["run"]["status"], "completed");
    assert_eq!(status["run"]["failures"], 0);
    assert_eq!(status["tasks"][0]["run_selected"], 5);
    assert!(status["tasks"][0]["run_seconds"].is_number());
    Ok(())
}

#[test]
fn reloaded_tasks_appear_with_their_first_committed_run() -> TestResult {
    init_tracing();
    let board = StatusBoard::new("demo/pipeline.toml");
    let first = registry();
    board.set_registry(&first);
    let (graph, state) = scenepipe::run(feature_graph(), &first);
    board.commit(Arc::new(RunOutcome::from_run(1, state, &graph)));

    let (mark, _) = tagging_body("mark", "yes");
    let mut second = TaskRegistry::new();
    second.register(
        TaskDecl::new("mark", mark)
            .order(OrderKey::parse("20")?)
            .path(PathPattern::parse("/Features/*")?),
    )?;
    board.set_registry(&second);

    // Run 2 is still in flight: status keeps describing run 1.
    let status = board.status();
    assert_eq!(status.run.as_ref().map(|r| r.run_id), Some(1));
    assert_eq!(status.tasks.len(), 1);
    assert_eq!(status.tasks[0].name, "tag");
    assert_eq!(status.tasks[0].run_selected, Some(5));

    let (graph, state) = scenepipe::run(feature_graph(), &second);
    board.commit(Arc::new(RunOutcome::from_run(2, state, &graph)));

    let status = board.status();
    assert_eq!(status.run.as_ref().map(|r| r.run_id), Some(2));
    assert_eq!(status.tasks.len(), 1);
    assert_eq!(status.tasks[0].name, "mark");
    assert_eq!(status.tasks[0].order_resolved, "20");
    assert_eq!(status.tasks[0].run_selected, Some(5));
    Ok(())
}

#[tokio::test]
async fn malformed_requests_get_an_error_and_the_session_survives() -> TestResult {
    let (_hub, _board, addr) = serve().await?;
    let mut client = Client::connect(addr).await?;

    let err = client.request("not json").await?;
    assert_eq!(err["type"], "error");
    assert!(err["message"].as_str().unwrap().contains("malformed"));

    let err = client.request(r#"{"type":"launch_missiles"}"#).await?;
    assert_eq!(err["type"], "error");

    let ok = client.request(r#"{"type":"result_get"}"#).await?;
    assert_eq!(ok["type"], "result");
    Ok(())
}

#[tokio::test]
async fn closed_sessions_are_dropped_from_the_hub() -> TestResult {
    let (hub, _board, addr) = serve().await?;
    {
        let mut client = Client::connect(addr).await?;
        client.request(r#"{"type":"status_get"}"#).await?;
        assert_eq!(hub.session_count().await, 1);
    }

    with_timeout(async {
        while hub.session_count().await != 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await;
    Ok(())
}
