//! The unit of work executed by the pool.

use async_trait::async_trait;
use thiserror::Error;

use crate::store::StoreError;

/// Why a task attempt failed. Any failure is retried.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Failed(String),
}

/// Work submitted to a [`WorkerPool`](super::WorkerPool).
///
/// Tasks may run more than once, so `execute` must be safe to repeat.
#[async_trait]
pub trait Task: Send + Sync {
    /// Runs one attempt.
    async fn execute(&self) -> Result<(), TaskError>;

    /// Identifier used in logs.
    fn id(&self) -> String;
}
