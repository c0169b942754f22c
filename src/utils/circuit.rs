//! Circuit breaker for upstream API calls
//!
//! After `failure_threshold` consecutive failures the breaker opens and every
//! call is refused until `reset_timeout` has elapsed since the last failure.
//! The next call is then let through in the half-open state; success closes
//! the breaker, failure re-opens it.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Thread-safe circuit breaker
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Default consecutive-failure threshold
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

    /// Default time the breaker stays open
    pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Breaker with the default threshold and timeout
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(
            name,
            Self::DEFAULT_FAILURE_THRESHOLD,
            Self::DEFAULT_RESET_TIMEOUT,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state without side effects
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive failures recorded since the last success
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Whether a call may proceed
    ///
    /// Moves an open breaker to half-open once the reset timeout has elapsed.
    pub fn allow(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map_or(Duration::MAX, |at| at.elapsed());
                if elapsed >= self.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    info!(breaker = %self.name, "Circuit breaker entering half-open state");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(breaker = %self.name, "Circuit breaker closed");
        }
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        let reopen = inner.state == CircuitState::HalfOpen;
        if (reopen || inner.failure_count >= self.failure_threshold)
            && inner.state != CircuitState::Open
        {
            inner.state = CircuitState::Open;
            warn!(
                breaker = %self.name,
                failures = inner.failure_count,
                "Circuit breaker opened"
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere; the counters stay usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new("test", 3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[test]
    fn test_success_resets_count() {
        let breaker = CircuitBreaker::new("test", 2, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 1);
    }

    #[test]
    fn test_half_open_after_timeout() {
        let breaker = CircuitBreaker::new("test", 1, Duration::ZERO);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("test", 5, Duration::ZERO);
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_defaults() {
        let breaker = CircuitBreaker::with_defaults("twitter");
        assert_eq!(breaker.name(), "twitter");
        assert_eq!(breaker.state().as_str(), "closed");
    }
}
