//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use log::warn;
use rand::Rng;

use crate::errors::{MarketDataError, RetryClass};

/// Default maximum number of attempts, including the first call.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Default cap on the backoff delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Retry policy configuration.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the initial call.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub initial_delay: Duration,
    /// Upper bound on the backoff delay before jitter.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Runs fallible provider calls, retrying transient failures with
/// exponentially increasing, jittered delays.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run an operation, retrying on transient errors.
    ///
    /// Only errors classified [`RetryClass::WithBackoff`] are retried;
    /// everything else is returned to the caller immediately. When all
    /// attempts fail the result is [`MarketDataError::RetriesExhausted`]
    /// carrying the last error.
    pub async fn run<F, Fut, T>(
        &self,
        provider: &str,
        mut operation: F,
    ) -> Result<T, MarketDataError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.initial_delay;
        let mut last_error: Option<MarketDataError> = None;

        for attempt in 1..=attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if err.retry_class() != RetryClass::WithBackoff {
                        return Err(err);
                    }
                    if attempt < attempts {
                        let sleep_for = jittered(delay.min(self.config.max_delay));
                        warn!(
                            "Transient error from {} (attempt {}/{}), retrying in {:?}: {}",
                            provider, attempt, attempts, sleep_for, err
                        );
                        tokio::time::sleep(sleep_for).await;
                        delay = delay.saturating_mul(2);
                    }
                    last_error = Some(err);
                }
            }
        }

        let last = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Err(MarketDataError::RetriesExhausted {
            provider: provider.to_string(),
            attempts,
            last_error: last,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Apply +/-10% jitter so concurrent retries do not align.
fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.9..=1.1);
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        })
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, MarketDataError>(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = fast_policy(3)
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(MarketDataError::Timeout {
                            provider: "test".to_string(),
                        })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = fast_policy(3)
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(MarketDataError::SymbolNotFound("NOPE".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(MarketDataError::SymbolNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = fast_policy(3)
            .run("finnhub", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(MarketDataError::ServerError {
                        provider: "finnhub".to_string(),
                        status: 503,
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(MarketDataError::RetriesExhausted {
                provider,
                attempts,
                last_error,
            }) => {
                assert_eq!(provider, "finnhub");
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let base = Duration::from_millis(1000);
        for _ in 0..50 {
            let jittered = jittered(base);
            assert!(jittered >= Duration::from_millis(900));
            assert!(jittered <= Duration::from_millis(1100));
        }
    }
}
