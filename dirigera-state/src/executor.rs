//! Handoff of consumer callbacks to the host's execution context
//!
//! The supervisor worker never runs consumer code inline. Every callback is
//! wrapped in a [`Job`] and handed to an [`Executor`]; a panicking job is
//! caught and logged so it cannot take down the worker or the jobs queued
//! after it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

/// A unit of consumer work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere consumer callbacks can be scheduled
pub trait Executor: Send + Sync {
    /// Schedule `job`; must not block on its completion
    fn execute(&self, job: Job);
}

/// Run a job, catching and logging a panic
pub(crate) fn run_isolated(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::warn!("Consumer callback panicked: {}", message);
    }
}

/// Runs jobs immediately on the calling thread
///
/// Suitable when the caller is already the host's scheduler, and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        run_isolated(job);
    }
}

/// Runs jobs in FIFO order on one dedicated callback thread
///
/// Jobs submitted from a single thread run in submission order, which keeps
/// per-device dispatch order intact.
pub struct ThreadExecutor {
    job_tx: Mutex<Option<mpsc::Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadExecutor {
    /// Spawn the callback thread
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();

        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            tracing::debug!("Callback executor started");
            for job in job_rx {
                run_isolated(job);
            }
            tracing::debug!("Callback executor stopped");
        })?;

        Ok(Self {
            job_tx: Mutex::new(Some(job_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop accepting jobs, run what is queued, and join the thread
    pub fn shutdown(&self) {
        self.job_tx.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("Callback executor thread panicked");
            }
        }
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        match self.job_tx.lock().as_ref() {
            Some(tx) => {
                if tx.send(job).is_err() {
                    tracing::warn!("Callback executor is gone, dropping job");
                }
            }
            None => tracing::debug!("Callback executor shut down, dropping job"),
        }
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain and exit on its own
        self.job_tx.lock().take();
    }
}
