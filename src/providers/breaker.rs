//! Circuit breaker for a degraded upstream.
//!
//! One breaker guards each logical operation. Consecutive failures past
//! the threshold open it; while open, calls fail fast with
//! [`RotomError::CircuitOpen`] instead of hitting the network. After the
//! recovery timeout a single probe is let through (half-open): success
//! closes the breaker, failure re-opens it.
//!
//! The breaker wraps the whole retried operation, so one exhausted retry
//! sequence counts as one failure.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::telemetry;
use crate::{Result, RotomError};

/// Configuration for the circuit breakers.
///
/// ```rust
/// # use rotom::BreakerConfig;
/// # use std::time::Duration;
/// let config = BreakerConfig::new()
///     .failure_threshold(3)
///     .recovery_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Whether breakers are active at all. Default: true.
    pub enabled: bool,
    /// Consecutive failures that open the breaker. Default: 5.
    pub failure_threshold: u32,
    /// How long an open breaker waits before allowing a probe. Default: 60s.
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with breakers turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the consecutive-failure threshold.
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Set the recovery timeout.
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }
}

/// Breaker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation.
    Closed,
    /// Failing fast; no requests go out.
    Open,
    /// Recovery probe in flight.
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    failures: u32,
    last_failure: Option<Instant>,
}

/// Per-operation fail-fast guard.
pub(crate) struct CircuitBreaker {
    operation: &'static str,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(operation: &'static str, config: BreakerConfig) -> Self {
        Self {
            operation,
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                last_failure: None,
            }),
        }
    }

    /// Gate a call. `Ok(())` lets it proceed; an open breaker fails fast
    /// with the time remaining until the next probe.
    pub fn check(&self) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let mut inner = self.lock();
        if inner.state != BreakerState::Open {
            return Ok(());
        }
        let elapsed = inner
            .last_failure
            .map(|at| at.elapsed())
            .unwrap_or(Duration::MAX);
        if elapsed >= self.config.recovery_timeout {
            info!(operation = self.operation, "circuit breaker half-open");
            inner.state = BreakerState::HalfOpen;
            return Ok(());
        }
        Err(RotomError::CircuitOpen {
            operation: self.operation,
            retry_in: self.config.recovery_timeout - elapsed,
        })
    }

    /// Record a successful call, closing the breaker if it was probing.
    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        let mut inner = self.lock();
        if inner.state == BreakerState::HalfOpen {
            info!(operation = self.operation, "circuit breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.failures = 0;
    }

    /// Record a failed call; at the threshold the breaker opens, and a
    /// failed half-open probe re-opens it immediately.
    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }
        let mut inner = self.lock();
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());
        let opens = match inner.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => inner.failures >= self.config.failure_threshold,
            BreakerState::Open => false,
        };
        if opens {
            warn!(
                operation = self.operation,
                failures = inner.failures,
                "circuit breaker open"
            );
            metrics::counter!(telemetry::BREAKER_OPENS_TOTAL, "operation" => self.operation)
                .increment(1);
            inner.state = BreakerState::Open;
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("breaker lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "sets",
            BreakerConfig::new()
                .failure_threshold(threshold)
                .recovery_timeout(recovery),
        )
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = breaker(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.check().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(matches!(
            breaker.check(),
            Err(RotomError::CircuitOpen { operation: "sets", .. })
        ));
    }

    #[test]
    fn success_resets_the_failure_count() {
        let breaker = breaker(3, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn recovery_timeout_allows_a_probe() {
        let breaker = breaker(1, Duration::from_millis(10));
        breaker.record_failure();
        assert!(breaker.check().is_err());

        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.check().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn failed_probe_reopens_immediately() {
        let breaker = breaker(2, Duration::from_millis(10));
        breaker.record_failure();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.check().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn disabled_breaker_never_trips() {
        let breaker = CircuitBreaker::new("sets", BreakerConfig::disabled());
        for _ in 0..20 {
            breaker.record_failure();
        }
        assert!(breaker.check().is_ok());
    }
}
