// tests/engine_core.rs

use std::path::PathBuf;
use std::sync::Arc;

use scenepipe::engine::{CoreCommand, CoreServer, RuntimeOptions, ServerEvent, ServerPhase};
use scenepipe::exec::RunOutcome;
use scenepipe::scene::SceneGraph;
use scenepipe::task::TaskRegistry;

fn finished(run_id: u64) -> ServerEvent {
    let (graph, state) = scenepipe::run(SceneGraph::empty(), &TaskRegistry::new());
    ServerEvent::RunFinished(Arc::new(RunOutcome::from_run(run_id, state, &graph)))
}

fn changed(p: &str) -> ServerEvent {
    ServerEvent::SourceChanged {
        path: PathBuf::from(p),
    }
}

fn reload_ok() -> ServerEvent {
    ServerEvent::ReloadFinished { result: Ok(3) }
}

fn kinds(commands: &[CoreCommand]) -> Vec<&'static str> {
    commands
        .iter()
        .map(|c| match c {
            CoreCommand::Reload => "reload",
            CoreCommand::StartRun { .. } => "start",
            CoreCommand::Commit(_) => "commit",
            CoreCommand::PublishResult { .. } => "publish",
            CoreCommand::RequestExit => "exit",
        })
        .collect()
}

#[test]
fn startup_walks_through_loading_and_running() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    assert!(core.is_idle());

    let step = core.step(ServerEvent::StartupRequested);
    assert_eq!(kinds(&step.commands), vec!["reload"]);
    assert_eq!(core.phase(), ServerPhase::Loading);

    let step = core.step(reload_ok());
    assert!(matches!(step.commands[..], [CoreCommand::StartRun { run_id: 1 }]));
    assert_eq!(core.phase(), ServerPhase::Running);
    assert_eq!(core.current_run(), Some(1));

    let step = core.step(finished(1));
    assert_eq!(kinds(&step.commands), vec!["commit", "publish"]);
    assert!(step.keep_running);
    assert!(core.is_idle());
    assert_eq!(core.current_run(), None);
}

#[test]
fn triggers_during_a_run_collapse_into_one_rerun() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    core.step(ServerEvent::StartupRequested);
    core.step(reload_ok());

    for p in ["a.toml", "b.toml", "a.toml"] {
        let step = core.step(changed(p));
        assert!(step.commands.is_empty(), "runs are never interrupted");
    }
    assert!(core.has_pending_rerun());
    assert_eq!(core.phase(), ServerPhase::Running);

    let step = core.step(finished(1));
    assert_eq!(kinds(&step.commands), vec!["commit", "publish", "reload"]);
    assert_eq!(core.phase(), ServerPhase::Loading);
    assert!(!core.has_pending_rerun());

    let step = core.step(reload_ok());
    assert!(matches!(step.commands[..], [CoreCommand::StartRun { run_id: 2 }]));

    let step = core.step(finished(2));
    assert_eq!(kinds(&step.commands), vec!["commit", "publish"]);
    assert!(core.is_idle());
}

#[test]
fn trigger_while_loading_is_pending_too() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    core.step(ServerEvent::StartupRequested);
    let step = core.step(changed("x.toml"));
    assert!(step.commands.is_empty());
    assert!(core.has_pending_rerun());
}

#[test]
fn failed_reload_returns_to_idle_without_running() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    core.step(ServerEvent::StartupRequested);

    let step = core.step(ServerEvent::ReloadFinished {
        result: Err("bad selector".into()),
    });
    assert!(step.commands.is_empty());
    assert!(step.keep_running);
    assert!(core.is_idle());

    // The next save tries again.
    let step = core.step(changed("pipeline.toml"));
    assert_eq!(kinds(&step.commands), vec!["reload"]);
}

#[test]
fn failed_reload_with_pending_trigger_reloads_again() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    core.step(ServerEvent::StartupRequested);
    core.step(changed("pipeline.toml"));

    let step = core.step(ServerEvent::ReloadFinished {
        result: Err("oops".into()),
    });
    assert_eq!(kinds(&step.commands), vec!["reload"]);
    assert_eq!(core.phase(), ServerPhase::Loading);
}

#[test]
fn stale_completions_are_ignored() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    core.step(ServerEvent::StartupRequested);
    core.step(reload_ok());

    let step = core.step(finished(41));
    assert!(step.commands.is_empty());
    assert_eq!(core.phase(), ServerPhase::Running);
    assert_eq!(core.current_run(), Some(1));
}

#[test]
fn reload_result_outside_loading_is_ignored() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    let step = core.step(reload_ok());
    assert!(step.commands.is_empty());
    assert!(core.is_idle());
}

#[test]
fn once_mode_exits_after_the_first_settled_run() {
    let mut core = CoreServer::new(RuntimeOptions {
        exit_when_idle: true,
    });
    core.step(ServerEvent::StartupRequested);
    core.step(reload_ok());

    let step = core.step(finished(1));
    assert_eq!(kinds(&step.commands), vec!["commit", "publish", "exit"]);
    assert!(!step.keep_running);
}

#[test]
fn shutdown_stops_immediately() {
    let mut core = CoreServer::new(RuntimeOptions::default());
    let step = core.step(ServerEvent::ShutdownRequested);
    assert!(step.commands.is_empty());
    assert!(!step.keep_running);
}
