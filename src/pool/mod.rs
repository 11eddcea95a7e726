//! Bounded worker pool.
//!
//! A fixed number of tokio tasks consume one shared FIFO queue. Submission
//! never blocks: when the queue is full the caller is told so immediately and
//! decides what to do instead.
//!
//! ```text
//!                ┌──────────────────────────┐      ┌──► worker 0
//!  submit() ───► │ bounded queue (capacity) │ ─────┼──► worker 1
//!     │          └──────────────────────────┘      └──► worker W-1
//!     └─ QueueFull / Cancelled
//! ```
//!
//! # Shutdown
//!
//! [`WorkerPool::stop`] closes intake and cancels the pool token. Tasks
//! already queued are still drained: each receives its first attempt, but
//! no retry waits happen once the token is cancelled.

pub mod retry;
pub mod task;

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub use retry::{RetryConfig, RetryOutcome, retry_fixed};
pub use task::{Task, TaskError};

type TaskQueue = Arc<tokio::sync::Mutex<mpsc::Receiver<Arc<dyn Task>>>>;

/// Why a task was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The pool has been stopped.
    #[error("worker pool is stopped")]
    Cancelled,

    /// Every queue slot is taken.
    #[error("worker pool queue is full")]
    QueueFull,
}

/// Pool sizing and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,

    /// Number of tasks that may wait in the queue.
    pub queue_size: usize,

    pub retry: RetryConfig,
}

impl PoolConfig {
    pub const DEFAULT_WORKERS: usize = 10;
    pub const DEFAULT_QUEUE_SIZE: usize = 100;

    pub fn new(workers: usize, queue_size: usize) -> Self {
        PoolConfig {
            workers,
            queue_size,
            retry: RetryConfig::DEFAULT,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig::new(Self::DEFAULT_WORKERS, Self::DEFAULT_QUEUE_SIZE)
    }
}

/// A fixed-size pool of workers sharing one bounded queue.
pub struct WorkerPool {
    config: PoolConfig,

    /// Intake side of the queue. `None` once the pool is stopped.
    sender: Mutex<Option<mpsc::Sender<Arc<dyn Task>>>>,

    /// Consumer side, shared by every worker.
    queue: TaskQueue,

    handles: Mutex<Vec<JoinHandle<()>>>,

    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Creates a pool. No workers run until [`start`](Self::start).
    pub fn new(config: PoolConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));

        WorkerPool {
            config,
            sender: Mutex::new(Some(tx)),
            queue: Arc::new(tokio::sync::Mutex::new(rx)),
            handles: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Spawns the workers. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if !handles.is_empty() || self.shutdown.is_cancelled() {
            return;
        }

        let workers = self.config.workers.max(1);
        for worker_id in 0..workers {
            let queue = Arc::clone(&self.queue);
            let retry = self.config.retry;
            let shutdown = self.shutdown.child_token();
            handles.push(tokio::spawn(run_worker(worker_id, queue, retry, shutdown)));
        }

        info!(
            workers,
            queue_size = self.config.queue_size,
            "Worker pool started"
        );
    }

    /// Enqueues a task without waiting.
    pub fn submit(&self, task: Arc<dyn Task>) -> Result<(), SubmitError> {
        if self.shutdown.is_cancelled() {
            return Err(SubmitError::Cancelled);
        }

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(SubmitError::Cancelled);
        };

        let task_id = task.id();
        match sender.try_send(task) {
            Ok(()) => {
                debug!(task_id = %task_id, "Task queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!(task_id = %task_id, "Worker pool queue full");
                Err(SubmitError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(SubmitError::Cancelled),
        }
    }

    /// Number of tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        sender
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    /// Maximum number of tasks the queue holds.
    pub fn capacity(&self) -> usize {
        self.config.queue_size.max(1)
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops intake, drains the queue and waits for every worker to exit.
    pub async fn stop(&self) {
        info!(queued = self.queued(), "Stopping worker pool");
        self.shutdown.cancel();

        // Dropping the only sender lets workers observe the end of the queue
        // once it is empty.
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }

        info!("Worker pool stopped");
    }
}

#[instrument(skip(queue, retry, shutdown))]
async fn run_worker(
    worker_id: usize,
    queue: TaskQueue,
    retry: RetryConfig,
    shutdown: CancellationToken,
) {
    debug!("Worker started");

    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };
        run_task(worker_id, task.as_ref(), retry, &shutdown).await;
    }

    debug!("Worker exiting");
}

async fn run_task(
    worker_id: usize,
    task: &dyn Task,
    retry: RetryConfig,
    shutdown: &CancellationToken,
) {
    let task_id = task.id();
    debug!(task_id = %task_id, worker_id, "Executing task");

    let outcome = retry_fixed(retry, shutdown, move || task.execute()).await;
    match outcome {
        RetryOutcome::Succeeded { attempts } => {
            debug!(task_id = %task_id, worker_id, attempts, "Task completed");
        }
        RetryOutcome::Exhausted {
            attempts,
            last_error,
        } => {
            error!(
                task_id = %task_id,
                worker_id,
                attempts,
                error = %last_error,
                "Task failed on every attempt, abandoning"
            );
        }
        RetryOutcome::Interrupted {
            attempts,
            last_error,
        } => {
            warn!(
                task_id = %task_id,
                worker_id,
                attempts,
                error = %last_error,
                "Task not retried because the pool is stopping"
            );
        }
    }
}
