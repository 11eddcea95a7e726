//! Fixed-delay retry that yields to shutdown.
//!
//! A task gets up to `max_attempts` attempts with the same delay between
//! them. The wait before a retry races the pool's cancellation token: once
//! the pool is stopping, a failed attempt is not retried.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Configuration for fixed-delay retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Wait between consecutive attempts.
    pub delay: Duration,
}

impl RetryConfig {
    /// Three attempts, two seconds apart.
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        delay: Duration::from_secs(2),
    };

    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Returns the longest time a task can spend waiting between attempts.
    pub fn total_max_wait(&self) -> Duration {
        self.delay * self.max_attempts.saturating_sub(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How a retried operation ended.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// An attempt succeeded.
    Succeeded { attempts: u32 },

    /// Every attempt failed.
    Exhausted { attempts: u32, last_error: E },

    /// Shutdown began while a retry was pending.
    Interrupted { attempts: u32, last_error: E },
}

impl<E> RetryOutcome<E> {
    /// Number of attempts actually made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Interrupted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }
}

/// Runs `operation` until it succeeds, attempts run out, or `shutdown` fires
/// while waiting to retry.
///
/// The first attempt always runs, even if `shutdown` is already cancelled.
pub async fn retry_fixed<E, F, Fut>(
    config: RetryConfig,
    shutdown: &CancellationToken,
    mut operation: F,
) -> RetryOutcome<E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        let last_error = match operation().await {
            Ok(()) => return RetryOutcome::Succeeded { attempts },
            Err(e) => e,
        };

        if attempts >= max_attempts {
            return RetryOutcome::Exhausted {
                attempts,
                last_error,
            };
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                return RetryOutcome::Interrupted { attempts, last_error };
            }
            _ = tokio::time::sleep(config.delay) => {}
        }
    }
}
