//! Exponential backoff for transient request failures.

use std::future::Future;
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Upper bound on retries regardless of the delay settings.
const MAX_RETRIES: usize = 32;

/// Retry schedule: wait `initial_delay`, then keep multiplying the wait by
/// `multiplier`, and give up once the next wait would exceed `max_delay`.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Waits between consecutive attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let policy = *self;
        std::iter::successors(Some(policy.initial_delay), move |d| {
            Some(d.saturating_mul(policy.multiplier))
        })
        .take_while(move |d| !d.is_zero() && *d <= policy.max_delay)
        .take(MAX_RETRIES)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// schedule runs out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delays = self.delays();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            let Some(delay) = delays.next() else {
                return Err(ClientError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                });
            };

            log::warn!(
                "Request failed ({}). Waiting {:?} before retrying.",
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
