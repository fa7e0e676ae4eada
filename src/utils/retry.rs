use crate::utils::error::Result;
use std::future::Future;
use std::time::Duration;

/// Fixed-delay retry: `max_attempts` tries in total, `delay` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Outcome of a retried operation. `Exhausted` keeps the last error so the
/// caller can decide how to surface it.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: usize },
    Exhausted { error: crate::EtlError, attempts: usize },
    Aborted { error: crate::EtlError, attempts: usize },
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Runs `op` until it succeeds, fails with an error `is_retryable` rejects,
    /// or the attempt budget runs out.
    pub async fn run<T, F, Fut, R>(&self, mut op: F, is_retryable: R) -> RetryOutcome<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
        R: Fn(&crate::EtlError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    }
                }
                Err(error) if !is_retryable(&error) => {
                    return RetryOutcome::Aborted {
                        error,
                        attempts: attempt,
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        "⚠️ Attempt {}/{} failed: {}",
                        attempt,
                        max_attempts,
                        error
                    );
                    if attempt >= max_attempts {
                        return RetryOutcome::Exhausted {
                            error,
                            attempts: attempt,
                        };
                    }
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
