//! Resilience layer: retry policy, per-endpoint circuit breakers, and the
//! recovery coordinator that composes them with a fallback chain.

mod cache;
mod circuit_breaker;
mod recovery;
mod retry;
mod stats;


pub use cache::FallbackCache;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use recovery::{FallbackChain, RecoveryConfig, RecoveryCoordinator};
pub use retry::{BackoffStrategy, RetryConfig, RetryDecision, RetryPolicy};
pub use stats::{ErrorStats, ErrorStatsSnapshot};
