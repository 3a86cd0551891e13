//! Per-endpoint circuit breaker.
//!
//! Stops calling an endpoint once it has failed enough consecutive times,
//! then admits a single trial call after a timeout to test recovery.

use crate::errors::{ProviderError, ProviderResult};
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker open
    pub failure_threshold: u32,
    /// How long the breaker stays open before admitting a trial call
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: crate::DEFAULT_FAILURE_THRESHOLD,
            open_timeout: crate::DEFAULT_OPEN_TIMEOUT,
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the consecutive-failure trip threshold.
    pub fn with_failure_threshold(mut self, failure_threshold: u32) -> Self {
        self.failure_threshold = failure_threshold;
        self
    }

    /// Set how long the breaker stays open before a trial call.
    pub fn with_open_timeout(mut self, open_timeout: Duration) -> Self {
        self.open_timeout = open_timeout;
        self
    }

    /// Validate settings.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.failure_threshold == 0 {
            return Err(ProviderError::Configuration {
                message: "failure_threshold must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Circuit breaker state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are refused without invoking the operation
    Open,
    /// One trial call is allowed through to test recovery
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker for a single endpoint.
///
/// All state lives behind one mutex so that concurrent failures are both
/// counted and a success racing a failure cannot be lost. One instance
/// exists per endpoint identity for the life of the process.
pub struct CircuitBreaker {
    endpoint: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker for the endpoint named by `endpoint` (used in logs
    /// and in the synthetic `CircuitOpen` error).
    pub fn new(endpoint: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Current state of the breaker.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Time remaining until an open breaker admits a trial call.
    /// `None` when the breaker is not open.
    pub fn time_until_half_open(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return None;
        }
        let last_failure = inner.last_failure_at?;
        Some(
            self.config
                .open_timeout
                .saturating_sub(last_failure.elapsed()),
        )
    }

    /// Run `operation` through the breaker.
    ///
    /// While open and within the timeout, fails with `CircuitOpen` without
    /// invoking the operation. A success closes the breaker and resets the
    /// failure count; a failure is counted (or reopens a half-open breaker)
    /// and the original error is propagated unchanged.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ProviderResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let trial = self.try_acquire()?;
        // Release the half-open trial slot if the future is dropped mid-call,
        // so a cancelled probe cannot wedge the breaker.
        let mut guard = TrialGuard {
            breaker: self,
            armed: trial,
        };

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        guard.armed = false;
        result
    }

    /// Check admission. Returns `Ok(true)` when this call holds the single
    /// half-open trial slot.
    fn try_acquire(&self) -> ProviderResult<bool> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.open_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    tracing::info!(endpoint = %self.endpoint, "circuit breaker half-open");
                    Ok(true)
                } else {
                    Err(ProviderError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                        retry_in: self.config.open_timeout - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // Another caller already holds the trial slot.
                    Err(ProviderError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                        retry_in: self.config.open_timeout,
                    })
                } else {
                    inner.trial_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(endpoint = %self.endpoint, "circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.trial_in_flight = false;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        failures = inner.failure_count,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.trial_in_flight = false;
                tracing::warn!(endpoint = %self.endpoint, "circuit breaker reopened");
            }
            CircuitState::Open => {}
        }
    }

    fn abandon_trial(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }
}

struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}
