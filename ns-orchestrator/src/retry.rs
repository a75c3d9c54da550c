//! Bounded retry with exponential backoff and a per-call timeout.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::error::{EngineError, RegistryError};

/// Errors that can tell transient failures apart from final ones.
pub trait Transient: Display {
    fn is_transient(&self) -> bool;
    fn timed_out(after: Duration) -> Self;
}

impl Transient for RegistryError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }

    fn timed_out(after: Duration) -> Self {
        RegistryError::Timeout(after)
    }
}

impl Transient for EngineError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }

    fn timed_out(after: Duration) -> Self {
        EngineError::Timeout(after)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting. Useful in tests.
    pub fn no_retry(call_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            call_timeout,
        }
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        E: Transient,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let result = match timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(self.call_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Transient failure, retrying in {:?}",
                        backoff
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
