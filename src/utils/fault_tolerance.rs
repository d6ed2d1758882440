use std::future::Future;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use tracing::{warn, error};
use crate::error::AppError;

/// Bounded retry configuration for outbound calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; zero disables retrying.
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delays between attempts: initial, 2x initial, 4x initial, ... capped at `max_delay`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let half = (self.initial_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(half)
            .max_delay(self.max_delay)
            .take(self.max_retries)
    }
}

/// Run `operation`, retrying transient failures with exponential backoff.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let result = RetryIf::spawn(
        config.delays(),
        || {
            let attempt = operation();
            async move {
                attempt.await.map_err(|e| {
                    if e.is_transient() {
                        warn!("Operation {} failed, will retry if attempts remain: {}", operation_name, e);
                    }
                    e
                })
            }
        },
        |e: &AppError| e.is_transient(),
    )
    .await;

    if let Err(e) = &result {
        error!("Operation {} failed: {}", operation_name, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_delays_double() {
        let config = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        };
        let delays: Vec<Duration> = config.delays().collect();
        assert_eq!(
            delays,
            vec![Duration::from_millis(500), Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert_eq!(RetryConfig::none().delays().count(), 0);
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicUsize::new(0);
        let result = retry_with_backoff("flaky", &fast_config(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::SourceUnavailable("timeout".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), AppError> = retry_with_backoff("missing", &fast_config(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::SourceDataMissing("bitcoin".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(AppError::SourceDataMissing(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), AppError> = retry_with_backoff("down", &fast_config(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::SourceUnavailable("connection refused".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
