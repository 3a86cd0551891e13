//! Error types for provider call mediation.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for provider-facing operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Classified error surfaced by a provider call.
///
/// Provider clients are responsible for mapping raw transport failures into
/// one of these variants before the error reaches the resilience layer; this
/// crate only consumes the classification.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Configuration error (invalid settings, missing required fields).
    /// Fatal, surfaced immediately, never retried.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration issue
        message: String,
    },

    /// Authentication error (invalid API key, missing credentials).
    /// Non-retryable; suggests a credential fix.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Description of the authentication issue
        message: String,
    },

    /// Connection error (connect failure, DNS issues, dropped socket)
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection issue
        message: String,
    },

    /// A call exceeded its per-call timeout
    #[error("Timeout error: {message}")]
    Timeout {
        /// Description of the timeout
        message: String,
    },

    /// Rate limit error (too many requests, quota exceeded)
    #[error("Rate limit error: {message}")]
    RateLimit {
        /// Description of the rate limit issue
        message: String,
        /// Duration to wait before retrying, if the provider supplied one
        retry_after: Option<Duration>,
    },

    /// The provider returned a payload that breaks its own contract
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the contract violation
        message: String,
    },

    /// Synthetic error raised by a [`CircuitBreaker`](crate::resilience::CircuitBreaker)
    /// when it refuses a call without invoking the operation. Non-retryable
    /// within the same coordinator pass, but eligible for fallback.
    #[error("Circuit open for {endpoint}, retry in {retry_in:?}")]
    CircuitOpen {
        /// Endpoint key whose breaker is open
        endpoint: String,
        /// Time remaining until the breaker admits a trial call
        retry_in: Duration,
    },

    /// An embedding had a different dimensionality than configured
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimensionality
        expected: usize,
        /// Observed dimensionality
        actual: usize,
    },

    /// A request batch exceeded the provider's documented limit
    #[error("Batch size {actual} exceeds limit {limit}")]
    BatchSizeExceeded {
        /// Maximum batch size accepted by the provider
        limit: usize,
        /// Size of the rejected batch
        actual: usize,
    },

    /// Anything the provider client could not classify
    #[error("Unknown error: {message}")]
    Unknown {
        /// Description of the failure
        message: String,
    },
}

/// Coarse error classification consumed by the retry policy.
///
/// Every [`ProviderError`] maps onto exactly one class via
/// [`ProviderError::class`].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorClass {
    /// Transport-level connection failure
    Connection,
    /// Per-call timeout
    Timeout,
    /// Provider-side throttling, optionally carrying an explicit retry-after
    RateLimit {
        /// Server-provided wait duration, which overrides the backoff strategy
        retry_after: Option<Duration>,
    },
    /// Credential problem
    Auth,
    /// Protocol/contract break, including configuration and validation errors
    InvalidResponse,
    /// Unclassifiable failure
    Unknown,
}

/// Field-less discriminant of [`ErrorClass`], usable in configuration
/// allow-lists and as a stable counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport-level connection failure
    Connection,
    /// Per-call timeout
    Timeout,
    /// Provider-side throttling
    RateLimit,
    /// Credential problem
    Auth,
    /// Protocol/contract break
    InvalidResponse,
    /// Unclassifiable failure
    Unknown,
}

impl ErrorKind {
    /// Stable lower-case label, used as a counter key in error statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Auth => "auth",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl ErrorClass {
    /// Discriminant of this class, dropping any carried data.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorClass::Connection => ErrorKind::Connection,
            ErrorClass::Timeout => ErrorKind::Timeout,
            ErrorClass::RateLimit { .. } => ErrorKind::RateLimit,
            ErrorClass::Auth => ErrorKind::Auth,
            ErrorClass::InvalidResponse => ErrorKind::InvalidResponse,
            ErrorClass::Unknown => ErrorKind::Unknown,
        }
    }
}

impl ProviderError {
    /// Classify this error for retry decisions.
    ///
    /// Configuration and validation failures classify as `InvalidResponse`
    /// since they share its retry semantics: never retryable. `CircuitOpen`
    /// classifies as `Unknown`; the recovery coordinator short-circuits it
    /// before the retry policy ever sees it.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::Connection { .. } => ErrorClass::Connection,
            ProviderError::Timeout { .. } => ErrorClass::Timeout,
            ProviderError::RateLimit { retry_after, .. } => ErrorClass::RateLimit {
                retry_after: *retry_after,
            },
            ProviderError::Authentication { .. } => ErrorClass::Auth,
            ProviderError::Configuration { .. }
            | ProviderError::InvalidResponse { .. }
            | ProviderError::DimensionMismatch { .. }
            | ProviderError::BatchSizeExceeded { .. } => ErrorClass::InvalidResponse,
            ProviderError::CircuitOpen { .. } | ProviderError::Unknown { .. } => ErrorClass::Unknown,
        }
    }

    /// Returns true if this error is retryable with backoff.
    ///
    /// Retryable errors are connection failures, timeouts, and rate limits.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Connection { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::RateLimit { .. }
        )
    }

    /// Returns the retry-after duration if the provider supplied one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
