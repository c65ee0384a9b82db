//! Engine affinity context
//!
//! Engines and renderers must be constructed on the context they will run
//! on. `AffinityContext` is a dedicated thread draining a single-consumer
//! job queue; callers submit a job and await its completion with a bounded
//! wait.

use crate::{Error, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer job queue running on its own thread
#[derive(Debug, Clone)]
pub struct AffinityContext {
    name: String,
    jobs: mpsc::UnboundedSender<Job>,
}

impl AffinityContext {
    /// Start the context thread
    ///
    /// When called inside a tokio runtime, jobs run with that runtime
    /// entered so they may spawn tasks.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        let runtime = tokio::runtime::Handle::try_current().ok();

        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = runtime.as_ref().map(|handle| handle.enter());
                while let Some(job) = rx.blocking_recv() {
                    job();
                }
                debug!("Affinity context drained");
            })?;

        Ok(Self { name, jobs })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `job` on the context and wait at most `wait` for its result
    pub async fn run<T, F>(&self, wait: Duration, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let wrapped: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(job));
            let _ = done_tx.send(outcome);
        });
        self.jobs
            .send(wrapped)
            .map_err(|_| Error::construction(format!("affinity context '{}' stopped", self.name)))?;

        match tokio::time::timeout(wait, done_rx).await {
            Err(_) => {
                error!(context = %self.name, waited_ms = wait.as_millis() as u64, "Construction timed out");
                Err(Error::ConstructionTimeout {
                    waited_ms: wait.as_millis() as u64,
                })
            }
            Ok(Err(_)) => Err(Error::construction(format!(
                "affinity context '{}' dropped the job",
                self.name
            ))),
            Ok(Ok(Err(_))) => {
                error!(context = %self.name, "Construction panicked");
                Err(Error::construction("construction job panicked"))
            }
            Ok(Ok(Ok(value))) => Ok(value),
        }
    }
}
