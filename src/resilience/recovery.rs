//! Recovery coordination: retries, circuit breaking, and fallbacks around a
//! single provider operation.

use crate::endpoint::EndpointIdentity;
use crate::errors::{ProviderError, ProviderResult};
use crate::resilience::cache::FallbackCache;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::resilience::retry::{RetryConfig, RetryPolicy};
use crate::resilience::stats::{ErrorStats, ErrorStatsSnapshot};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for a [`RecoveryCoordinator`].
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Retry policy applied to every wrapped call
    pub retry: RetryConfig,
    /// Settings for each lazily created per-endpoint breaker
    pub circuit_breaker: CircuitBreakerConfig,
    /// Maximum entries in the fallback response cache
    pub cache_capacity: usize,
    /// Default lifetime of cached fallback responses
    pub cache_ttl: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache_capacity: 256,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl RecoveryConfig {
    /// Validate all nested settings.
    pub fn validate(&self) -> ProviderResult<()> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        if self.cache_capacity == 0 {
            return Err(ProviderError::Configuration {
                message: "cache_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Ordered fallback steps tried after the primary operation is exhausted.
///
/// Steps run in declaration order: backup operation, then cached response,
/// then synthesized degraded response. Each is optional.
pub struct FallbackChain<T> {
    backup: Option<BoxFuture<'static, ProviderResult<T>>>,
    cache_key: Option<String>,
    degraded: Option<Box<dyn FnOnce() -> T + Send>>,
}

impl<T> FallbackChain<T> {
    /// A chain with no steps: the caller sees the original error on failure.
    pub fn none() -> Self {
        Self {
            backup: None,
            cache_key: None,
            degraded: None,
        }
    }

    /// Add an alternate operation (e.g. a different provider) invoked once
    /// on final failure, without retries of its own.
    pub fn with_backup<Fut>(mut self, backup: Fut) -> Self
    where
        Fut: Future<Output = ProviderResult<T>> + Send + 'static,
    {
        self.backup = Some(Box::pin(backup));
        self
    }

    /// Serve (and on success, populate) the response cache under `key`.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Add a constructor for a clearly marked degraded response. This step
    /// always succeeds.
    pub fn with_degraded<F>(mut self, degraded: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.degraded = Some(Box::new(degraded));
        self
    }

    fn is_empty(&self) -> bool {
        self.backup.is_none() && self.cache_key.is_none() && self.degraded.is_none()
    }
}

impl<T> Default for FallbackChain<T> {
    fn default() -> Self {
        Self::none()
    }
}

/// Composes retry policy and per-endpoint circuit breakers around provider
/// operations, with a fallback chain for final failures.
///
/// Construct one instance at process start and share it by reference; there
/// is no hidden global. Breakers are created lazily per endpoint identity
/// and kept for the life of the coordinator.
pub struct RecoveryCoordinator {
    retry_policy: RetryPolicy,
    breaker_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    cache: FallbackCache,
    stats: ErrorStats,
}

impl RecoveryCoordinator {
    /// Create a coordinator from the given configuration.
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            retry_policy: RetryPolicy::new(config.retry),
            breaker_config: config.circuit_breaker,
            breakers: RwLock::new(HashMap::new()),
            cache: FallbackCache::new(config.cache_capacity, config.cache_ttl),
            stats: ErrorStats::new(),
        }
    }

    /// Run `operation` against `endpoint` with retries, circuit breaking,
    /// and the given fallback chain.
    ///
    /// Retries are strictly sequential; the backoff sleep is cancellable by
    /// dropping the returned future. On success the result is cached under
    /// the chain's cache key, if any. On final failure the chain is tried in
    /// order; if every step is exhausted the original classified error is
    /// returned.
    pub async fn run<T, F, Fut>(
        &self,
        endpoint: &EndpointIdentity,
        operation: F,
        fallback: FallbackChain<T>,
    ) -> ProviderResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: Fn() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let key = endpoint.key();
        let breaker = self.breaker_for(&key);
        let mut attempt: u32 = 1;

        let final_error = loop {
            match breaker.execute(&operation).await {
                Ok(value) => {
                    self.stats.record_success();
                    if let Some(cache_key) = &fallback.cache_key {
                        self.cache_value(cache_key, &value);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    self.stats.record_error(&error, &key);

                    // A short-circuited call is not retryable in this pass;
                    // it goes straight to the fallback chain.
                    if matches!(error, ProviderError::CircuitOpen { .. }) {
                        tracing::debug!(endpoint = %key, "call short-circuited by open breaker");
                        break error;
                    }

                    let decision = self.retry_policy.decide(&error.class(), attempt);
                    if !decision.should_retry {
                        break error;
                    }

                    tracing::debug!(
                        endpoint = %key,
                        attempt,
                        delay_ms = decision.delay.as_millis() as u64,
                        error = %error,
                        "retrying after failure"
                    );
                    sleep(decision.delay).await;
                    attempt += 1;
                }
            }
        };

        self.run_fallbacks(&key, fallback, final_error).await
    }

    async fn run_fallbacks<T>(
        &self,
        endpoint_key: &str,
        fallback: FallbackChain<T>,
        original_error: ProviderError,
    ) -> ProviderResult<T>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        if fallback.is_empty() {
            return Err(original_error);
        }
        self.stats.record_recovery_attempt();

        if let Some(backup) = fallback.backup {
            match backup.await {
                Ok(value) => {
                    tracing::info!(endpoint = %endpoint_key, "backup operation recovered the call");
                    self.stats.record_recovery_success();
                    return Ok(value);
                }
                Err(error) => {
                    tracing::warn!(endpoint = %endpoint_key, error = %error, "backup operation failed");
                }
            }
        }

        if let Some(cache_key) = &fallback.cache_key {
            if let Some(value) = self.cached_value(cache_key) {
                tracing::info!(endpoint = %endpoint_key, cache_key, "served cached response");
                self.stats.record_recovery_success();
                return Ok(value);
            }
        }

        if let Some(degraded) = fallback.degraded {
            tracing::warn!(endpoint = %endpoint_key, "returning synthesized degraded response");
            self.stats.record_recovery_success();
            return Ok(degraded());
        }

        Err(original_error)
    }

    fn cache_value<T: Serialize>(&self, cache_key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.cache.put(cache_key, json),
            Err(error) => {
                tracing::warn!(cache_key, error = %error, "response not cacheable, skipping");
            }
        }
    }

    fn cached_value<T: DeserializeOwned>(&self, cache_key: &str) -> Option<T> {
        let json = self.cache.get(cache_key)?;
        match serde_json::from_value(json) {
            Ok(value) => Some(value),
            Err(_) => {
                // Shape drift since the entry was stored; treat as a miss.
                self.cache.invalidate(cache_key);
                None
            }
        }
    }

    /// The breaker guarding `endpoint`, created on first use.
    pub fn breaker_for_endpoint(&self, endpoint: &EndpointIdentity) -> Arc<CircuitBreaker> {
        self.breaker_for(&endpoint.key())
    }

    /// Breaker state for `endpoint`, if one has been created.
    pub fn breaker_state(&self, endpoint: &EndpointIdentity) -> Option<CircuitState> {
        self.breakers
            .read()
            .get(&endpoint.key())
            .map(|b| b.state())
    }

    /// Snapshot of the accumulated error statistics.
    pub fn stats(&self) -> ErrorStatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero the accumulated error statistics.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn breaker_for(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(key) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(
            breakers
                .entry(key.to_string())
                .or_insert_with(|| {
                    Arc::new(CircuitBreaker::new(key, self.breaker_config.clone()))
                }),
        )
    }
}
