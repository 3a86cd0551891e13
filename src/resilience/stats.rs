//! Aggregate error and recovery statistics.

use crate::errors::ProviderError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// Point-in-time copy of the counters kept by [`ErrorStats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorStatsSnapshot {
    /// Total failed attempts observed
    pub total_errors: u64,
    /// Failed attempts per error class label
    pub errors_by_class: HashMap<String, u64>,
    /// Failed attempts per endpoint key
    pub errors_by_endpoint: HashMap<String, u64>,
    /// Failures since the last successful call
    pub consecutive_failures: u32,
    /// When the most recent error was recorded
    pub last_error_at: Option<DateTime<Utc>>,
    /// How many times the fallback chain was entered
    pub recovery_attempts: u64,
    /// How many fallback chain entries produced a usable result
    pub successful_recoveries: u64,
}

/// Counters shared by all calls through one recovery coordinator.
///
/// Created with the coordinator, reset on demand, never persisted. Updates
/// happen regardless of whether recovery ultimately succeeds, so the caller
/// seeing a degraded result does not hide the underlying failures.
#[derive(Debug, Default)]
pub struct ErrorStats {
    inner: Mutex<ErrorStatsSnapshot>,
}

impl ErrorStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful primary call.
    pub fn record_success(&self) {
        self.inner.lock().consecutive_failures = 0;
    }

    /// Record one failed attempt against `endpoint_key`.
    pub fn record_error(&self, error: &ProviderError, endpoint_key: &str) {
        let mut inner = self.inner.lock();
        inner.total_errors += 1;
        inner.consecutive_failures += 1;
        inner.last_error_at = Some(Utc::now());
        *inner
            .errors_by_class
            .entry(error.class().kind().as_str().to_string())
            .or_insert(0) += 1;
        *inner
            .errors_by_endpoint
            .entry(endpoint_key.to_string())
            .or_insert(0) += 1;
    }

    /// Record that the fallback chain was entered.
    pub fn record_recovery_attempt(&self) {
        self.inner.lock().recovery_attempts += 1;
    }

    /// Record that a fallback step produced a usable result.
    pub fn record_recovery_success(&self) {
        self.inner.lock().successful_recoveries += 1;
    }

    /// Zero all counters.
    pub fn reset(&self) {
        *self.inner.lock() = ErrorStatsSnapshot::default();
    }

    /// Consistent copy of the current counters.
    pub fn snapshot(&self) -> ErrorStatsSnapshot {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_error() -> ProviderError {
        ProviderError::Connection {
            message: "refused".to_string(),
        }
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = ErrorStats::new();
        stats.record_error(&connection_error(), "a:llm:m");
        stats.record_error(&connection_error(), "a:llm:m");
        stats.record_error(
            &ProviderError::Timeout {
                message: "slow".to_string(),
            },
            "b:embedding:m",
        );

        let snap = stats.snapshot();
        assert_eq!(snap.total_errors, 3);
        assert_eq!(snap.consecutive_failures, 3);
        assert_eq!(snap.errors_by_class["connection"], 2);
        assert_eq!(snap.errors_by_class["timeout"], 1);
        assert_eq!(snap.errors_by_endpoint["a:llm:m"], 2);
        assert!(snap.last_error_at.is_some());
    }

    #[test]
    fn test_success_resets_consecutive_only() {
        let stats = ErrorStats::new();
        stats.record_error(&connection_error(), "a:llm:m");
        stats.record_success();

        let snap = stats.snapshot();
        assert_eq!(snap.consecutive_failures, 0);
        assert_eq!(snap.total_errors, 1);
    }

    #[test]
    fn test_recovery_counters_and_reset() {
        let stats = ErrorStats::new();
        stats.record_recovery_attempt();
        stats.record_recovery_success();
        assert_eq!(stats.snapshot().recovery_attempts, 1);
        assert_eq!(stats.snapshot().successful_recoveries, 1);

        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.recovery_attempts, 0);
        assert_eq!(snap.total_errors, 0);
        assert!(snap.errors_by_class.is_empty());
    }
}
