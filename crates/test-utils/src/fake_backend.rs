use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use scenepipe::engine::ServerEvent;
use scenepipe::errors::Result;
use scenepipe::exec::{RunBackend, RunJob, RunOutcome};

/// A backend that:
/// - records the run id and generation of every job it is given
/// - runs the job inline with `scenepipe::run` (no worker thread)
/// - immediately reports `RunFinished` back to the runtime.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<ServerEvent>,
    started: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<ServerEvent>, started: Arc<Mutex<Vec<(u64, u64)>>>) -> Self {
        Self { runtime_tx, started }
    }
}

impl RunBackend for FakeBackend {
    fn start_run(&mut self, job: RunJob) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let started = Arc::clone(&self.started);

        Box::pin(async move {
            started.lock().unwrap().push((job.run_id, job.generation));

            let (graph, state) = scenepipe::run(job.graph, &job.registry);
            let outcome = RunOutcome::from_run(job.run_id, state, &graph);

            tx.send(ServerEvent::RunFinished(Arc::new(outcome)))
                .await
                .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }
}
