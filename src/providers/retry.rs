//! Retry configuration and the shared retry helper.
//!
//! Applies only to idempotent GET-style reads against the upstream
//! services. Transient failures (as classified by
//! [`RotomError::is_transient()`]) are retried with exponential backoff;
//! decode errors and explicit not-found never enter this path.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::telemetry;
use crate::{Result, RotomError};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional jitter:
///
/// ```rust
/// # use rotom::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(true);
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 10s.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays. Default: true.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Exponential backoff: `initial_delay * 2^attempt`, capped at
    /// `max_delay`. Does NOT include jitter; see
    /// [`effective_delay()`](Self::effective_delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Calculate the effective delay for an attempt.
    ///
    /// An upstream `Retry-After` hint takes precedence over the computed
    /// backoff. With jitter enabled, the backoff is scaled by a random
    /// factor in `[0.5, 1.0]` to avoid retry stampedes.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint;
        }
        let delay = self.delay_for_attempt(attempt);
        if self.jitter {
            delay.mul_f64(0.5 + 0.5 * rand::random::<f64>())
        } else {
            delay
        }
    }
}

/// Execute an async operation with retry logic.
///
/// Retries transient errors up to `config.max_attempts`, sleeping the
/// effective backoff delay between attempts. Permanent errors are
/// returned immediately without retry.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    service: &'static str,
    operation: &'static str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "service" => service,
                    "operation" => operation,
                )
                .increment(1);
                if attempt + 1 < config.max_attempts {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    warn!(
                        service,
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e), // permanent error, no retry
        }
    }
    Err(last_err
        .unwrap_or_else(|| RotomError::Configuration("retry max_attempts is zero".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(10));

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn retry_after_hint_takes_precedence() {
        let config = RetryConfig::new().jitter(false);
        let hint = Some(Duration::from_secs(42));
        assert_eq!(config.effective_delay(0, hint), Duration::from_secs(42));
        assert_eq!(config.effective_delay(0, None), config.delay_for_attempt(0));
    }

    #[test]
    fn jitter_stays_within_half_to_full_delay() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(4))
            .jitter(true);
        for _ in 0..50 {
            let delay = config.effective_delay(0, None);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_secs(4));
        }
    }

    #[tokio::test]
    async fn transient_failures_then_success_runs_n_plus_one_attempts() {
        let config = RetryConfig::new()
            .max_attempts(5)
            .initial_delay(Duration::from_millis(1))
            .jitter(false);
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result = with_retry(&config, "sets", "test", || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(RotomError::Timeout)
            } else {
                Ok("payload")
            }
        })
        .await;

        assert_eq!(result.expect("succeeds on third attempt"), "payload");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_propagate_last_error() {
        let config = RetryConfig::new()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1))
            .jitter(false);
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result: Result<()> = with_retry(&config, "sets", "test", || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RotomError::Timeout)
        })
        .await;

        assert!(matches!(result, Err(RotomError::Timeout)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let config = RetryConfig::new().max_attempts(3);
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let result: Result<()> = with_retry(&config, "sets", "test", || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RotomError::Decode("bad payload".into()))
        })
        .await;

        assert!(matches!(result, Err(RotomError::Decode(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
