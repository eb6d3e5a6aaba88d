//! Retry logic with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use crate::errors::{BotError, BotResult};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay_ms,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.exponential_base.powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_delay_ms as f64 * factor) as u64;
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Result of a retried operation together with how many attempts it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: BotResult<T>,
    pub attempts: u32,
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts. Only errors classified as transient are retried.
pub async fn retry_counted<F, Fut, T>(mut operation: F, config: &RetryConfig, context: &str) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BotResult<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Attempted { result: Ok(value), attempts: attempt },
            Err(e) if !e.is_retryable() => {
                return Attempted { result: Err(e), attempts: attempt };
            }
            Err(e) if attempt >= config.max_attempts => {
                warn!(context, attempts = attempt, error = %e, "Giving up after retries");
                return Attempted { result: Err(e), attempts: attempt };
            }
            Err(e) => {
                let delay = config.delay_for(attempt);
                let jitter = (delay.as_millis() as f64 * 0.1 * rand::random::<f64>()) as u64;
                let delay = delay + Duration::from_millis(jitter);
                warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                    attempt,
                    config.max_attempts,
                    context,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

pub async fn retry_with_backoff<F, Fut, T>(operation: F, config: &RetryConfig, context: &str) -> BotResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BotResult<T>>,
{
    retry_counted(operation, config, context).await.result
}

/// Bounds a suspension point; an elapsed timer becomes a retryable
/// [`BotError::Timeout`].
pub async fn with_timeout<Fut, T>(timeout: Duration, operation: &str, future: Fut) -> BotResult<T>
where
    Fut: Future<Output = BotResult<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(BotError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            exponential_base: 2.0,
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome = retry_counted(
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(BotError::RateLimited { service: "quotes".to_string() })
                    } else {
                        Ok(42)
                    }
                }
            },
            &fast(),
            "quote fetch",
        )
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let outcome: Attempted<()> = retry_counted(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(BotError::SlippageExceeded { message: "0x1771".to_string() })
                }
            },
            &fast(),
            "send",
        )
        .await;

        assert!(matches!(outcome.result, Err(BotError::SlippageExceeded { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_error() {
        let outcome: Attempted<()> = retry_counted(
            || async {
                Err(BotError::Timeout {
                    operation: "sendTransaction".to_string(),
                    timeout_ms: 10,
                })
            },
            &fast(),
            "send",
        )
        .await;

        assert_eq!(outcome.attempts, 3);
        assert!(matches!(outcome.result, Err(BotError::Timeout { .. })));
    }

    #[tokio::test]
    async fn elapsed_timeout_is_retryable() {
        let result: BotResult<()> = with_timeout(Duration::from_millis(5), "getSignatureStatuses", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_millis(500));
        assert_eq!(config.delay_for(2), Duration::from_millis(1000));
        assert_eq!(config.delay_for(5), Duration::from_millis(5000));
    }
}
