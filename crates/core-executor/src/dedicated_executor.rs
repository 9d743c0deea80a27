//! Runs query jobs on their own OS thread so a pathological plan can never
//! stall the caller's runtime.
//!
//! Every job gets a fresh current-thread tokio runtime. The caller awaits the
//! job's output with a hard deadline; once the deadline passes the caller is
//! released immediately and the job observes cancellation through its
//! [`JobContext`], which every operator of a query plan checks before handing
//! out its next batch (see [`crate::cancellation`]). When the job returns, its
//! runtime (and every task the query engine spawned on it) is dropped.

use snafu::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum JobError {
    #[snafu(display("Job exceeded its budget of {timeout_ms} ms"))]
    Timeout { timeout_ms: u64 },

    #[snafu(display("Worker thread terminated before producing a result"))]
    WorkerLost,

    #[snafu(display("Failed to spawn worker thread: {source}"))]
    Spawn { source: std::io::Error },

    #[snafu(display("Failed to build worker runtime: {source}"))]
    Runtime { source: std::io::Error },
}

/// Cancellation state shared between a running job and its caller.
#[derive(Debug, Clone)]
pub struct JobContext {
    deadline: Option<Instant>,
    timeout: Duration,
    cancelled: Arc<AtomicBool>,
}

impl JobContext {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
            timeout,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once the caller has given up or the deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        duration_ms(self.timeout)
    }
}

/// Flags the job as cancelled when the awaiting side goes away, whether it
/// timed out or its own future was dropped.
struct CancelOnDrop(JobContext);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[derive(Debug, Clone)]
pub struct DedicatedExecutorBuilder {
    thread_name: String,
}

impl DedicatedExecutorBuilder {
    #[must_use]
    pub fn with_thread_name(mut self, thread_name: &str) -> Self {
        self.thread_name = thread_name.to_string();
        self
    }

    #[must_use]
    pub fn build(self) -> DedicatedExecutor {
        DedicatedExecutor {
            thread_name: self.thread_name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedicatedExecutor {
    thread_name: String,
}

impl DedicatedExecutor {
    #[must_use]
    pub fn builder() -> DedicatedExecutorBuilder {
        DedicatedExecutorBuilder {
            thread_name: "sql-job".to_string(),
        }
    }

    /// Runs `job` on a dedicated thread and waits at most `timeout` for its output.
    pub async fn run<F, Fut, T>(&self, timeout: Duration, job: F) -> Result<T, JobError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = T> + 'static,
        T: Send + 'static,
    {
        let job_ctx = JobContext::new(timeout);
        let _guard = CancelOnDrop(job_ctx.clone());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context(RuntimeSnafu)?;
        let (tx, rx) = oneshot::channel();

        let worker_ctx = job_ctx.clone();
        std::thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let output = runtime.block_on(job(worker_ctx));
                // The receiver is gone when the caller timed out.
                let _ = tx.send(output);
            })
            .context(SpawnSnafu)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(_)) => WorkerLostSnafu.fail(),
            Err(_) => TimeoutSnafu {
                timeout_ms: job_ctx.timeout_ms(),
            }
            .fail(),
        }
    }
}

#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
