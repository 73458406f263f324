use std::future::Future;
use std::time::Duration;

use crate::model::{ErrorKind, MutationAttempt, ResourceError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

pub trait BackoffPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }
}

impl BackoffPolicy for RetryPolicy {
    /// Linear: attempt 1 waits 1x base, attempt 2 waits 2x base
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(attempt as u64))
    }
}

/// Whether trying the same call again could plausibly succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Only 4xx answers and failures raised locally are terminal
impl Retryable for ResourceError {
    fn is_retryable(&self) -> bool {
        match self.status {
            Some(status) => !(400..500).contains(&status),
            None => !matches!(self.kind, ErrorKind::Validation | ErrorKind::Conflict),
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy runs out of attempts. The last error is returned as-is.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    run(policy, operation, |_, _, _, _| {}).await
}

/// Same as [`execute`], reporting every failed attempt to `observer` before
/// the executor decides whether to wait and retry.
pub async fn execute_observed<T, F, Fut, O>(
    policy: &RetryPolicy,
    operation: F,
    mut observer: O,
) -> Result<T, ResourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ResourceError>>,
    O: FnMut(&MutationAttempt),
{
    run(policy, operation, |attempt_number, max_attempts, error: &ResourceError, is_retryable| {
        observer(&MutationAttempt {
            attempt_number,
            max_attempts,
            last_error: Some(error.clone()),
            is_retryable,
        })
    })
    .await
}

async fn run<T, E, F, Fut, O>(policy: &RetryPolicy, mut operation: F, mut on_failure: O) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
    O: FnMut(usize, usize, &E, bool),
{
    let max_attempts = policy.attempts();
    let mut attempt = 1usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable();
                on_failure(attempt, max_attempts, &err, retryable);
                if !retryable || attempt >= max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}
