//! # Model Resilience
//!
//! Resilience and health monitoring for calls to hosted model endpoints
//! (LLM completion, embedding, and reranking APIs).
//!
//! ## Features
//!
//! - Classified, typed errors with retryability baked into the taxonomy
//! - Configurable retry policy (fixed, exponential, linear, Fibonacci
//!   backoff) with jitter and server-directed `retry_after` handling
//! - Per-endpoint circuit breakers with half-open trial probing
//! - Recovery coordination: retries, breakers, and an ordered fallback
//!   chain (backup operation, cached response, degraded response)
//! - Health probing with canary operations, startup and periodic checks
//! - Deduplicated alerting with cooldown, auto-resolution, and pluggable
//!   delivery sinks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use model_resilience::{
//!     EndpointIdentity, FallbackChain, ModelType, ProviderError,
//!     RecoveryConfig, RecoveryCoordinator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = RecoveryCoordinator::new(RecoveryConfig::default());
//!     let endpoint = EndpointIdentity::new("openai", "gpt-4o", ModelType::Llm);
//!
//!     let answer: String = coordinator
//!         .run(
//!             &endpoint,
//!             || async {
//!                 // call the provider here
//!                 Err(ProviderError::Timeout {
//!                     message: "deadline exceeded".to_string(),
//!                 })
//!             },
//!             FallbackChain::none().with_degraded(|| {
//!                 "[service degraded] please retry later".to_string()
//!             }),
//!         )
//!         .await?;
//!
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `errors` - Error taxonomy and classification
//! - `endpoint` - Endpoint identity (provider, model, model type)
//! - `resilience` - Retry policy, circuit breakers, recovery coordinator
//! - `health` - Canary-based health probing and reporting
//! - `alerts` - Alert lifecycle and delivery sinks
//! - `config` - Aggregate configuration
//! - `observability` - Logging setup
//! - `clock` - Injectable time source

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::time::Duration;

/// Default maximum attempts per call, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base backoff delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
/// Default cap on any computed backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
/// Default consecutive-failure count that trips a circuit breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default time an open breaker waits before admitting a trial call.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);
/// Default spacing between periodic health probe passes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);
/// Default per-canary timeout within a probe pass.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Default minimum time between two firings of the same alert id.
pub const DEFAULT_ALERT_COOLDOWN: Duration = Duration::from_secs(300);

pub mod alerts;
pub mod clock;
pub mod config;
pub mod endpoint;
pub mod errors;
pub mod health;
pub mod observability;
pub mod resilience;

pub use alerts::{
    Alert, AlertCondition, AlertConfig, AlertManager, AlertSeverity, AlertSink, MemoryAlertSink,
    TracingAlertSink,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use endpoint::{EndpointIdentity, ModelType};
pub use errors::{ErrorClass, ErrorKind, ProviderError, ProviderResult};
pub use health::{
    CanaryOperation, EndpointHealth, HealthAlert, HealthCheckConfig, HealthProbe, HealthRecord,
    HealthReport, OverallStatus, ProbeResult, ProviderHealth,
};
pub use observability::{LogFormat, LogLevel, LoggingConfig};
pub use resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitState, ErrorStatsSnapshot,
    FallbackCache, FallbackChain, RecoveryConfig, RecoveryCoordinator, RetryConfig, RetryDecision,
    RetryPolicy,
};
