use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use scenepipe::errors::{PipelineError, Result};
use scenepipe::task::{RegistrySource, TaskRegistry};

type Factory = Box<dyn FnMut(usize) -> Result<TaskRegistry> + Send>;

/// Registry source backed by a closure. The closure receives the 1-based
/// reload count, so tests can make particular reloads fail.
pub struct StaticSource {
    factory: Factory,
    reloads: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new<F>(factory: F) -> Self
    where
        F: FnMut(usize) -> Result<TaskRegistry> + Send + 'static,
    {
        Self {
            factory: Box::new(factory),
            reloads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every reload fails with a configuration error.
    pub fn failing(msg: &'static str) -> Self {
        Self::new(move |_| Err(PipelineError::ConfigError(msg.to_string())))
    }

    /// Shared reload counter, readable after the source moved into a runtime.
    pub fn reloads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reloads)
    }
}

impl RegistrySource for StaticSource {
    fn reload(&mut self) -> Result<TaskRegistry> {
        let n = self.reloads.fetch_add(1, Ordering::SeqCst) + 1;
        (self.factory)(n)
    }

    fn script(&self) -> String {
        "static".to_string()
    }
}
