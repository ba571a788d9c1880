//! Retry with pure exponential backoff.
//!
//! Only [`FailureClass::Transient`] failures are retried. The delay before
//! retry `n` (0-based) is `initial_delay × 2^n`, with no jitter.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{FailureClass, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Delay to wait after the failed attempt at `attempt_index` (0-based).
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt_index).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Run `op` until it succeeds, fails non-transiently, or attempts run out.
///
/// The last failure is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.class != FailureClass::Transient => return Err(err),
            Err(err) if attempt + 1 >= max_attempts => return Err(err),
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err.message,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10))
    }

    #[test]
    fn delays_double() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for(0), Duration::from_millis(1000));
        assert_eq!(p.delay_for(1), Duration::from_millis(2000));
        assert_eq!(p.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn transient_twice_then_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&quick(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::transient("503"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&quick(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::permanent("401 unauthorized")) }
        })
        .await;
        assert_eq!(result.unwrap_err().message, "401 unauthorized");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn configuration_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&quick(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::configuration("key missing")) }
        })
        .await;
        assert!(result.unwrap_err().is_configuration());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&quick(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(ProviderError::transient(format!("attempt {n}"))) }
        })
        .await;
        assert_eq!(result.unwrap_err().message, "attempt 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_does_not_sleep() {
        let start = tokio::time::Instant::now();
        let result = retry_with_backoff(&RetryPolicy::default(), "test", || async {
            Ok::<_, ProviderError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_initial_then_double() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result = retry_with_backoff(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::transient("429"))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "waited {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "waited {elapsed:?}");
    }
}
