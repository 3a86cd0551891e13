//! Pure retry decision and backoff calculation.

use crate::errors::{ErrorClass, ErrorKind, ProviderError, ProviderResult};
use std::time::Duration;

/// Backoff strategy used to space retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// `base_delay` on every attempt
    Fixed,
    /// `base_delay * multiplier^(attempt-1)`
    Exponential,
    /// `base_delay * attempt`
    Linear,
    /// `base_delay * fib(attempt-1)` with `fib(0) = fib(1) = 1`
    Fibonacci,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first call
    pub max_attempts: u32,
    /// Delay growth strategy
    pub strategy: BackoffStrategy,
    /// Base delay fed into the strategy
    pub base_delay: Duration,
    /// Hard cap on any computed delay
    pub max_delay: Duration,
    /// Multiplier for the exponential strategy
    pub backoff_multiplier: f64,
    /// When true, delays are scaled by a uniform factor in `[0.5, 1.0]`
    pub jitter: bool,
    /// Error kinds eligible for retry. `Auth` and `InvalidResponse` are
    /// refused even if listed here.
    pub retryable_classes: Vec<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::DEFAULT_MAX_ATTEMPTS,
            strategy: BackoffStrategy::Exponential,
            base_delay: crate::DEFAULT_BASE_DELAY,
            max_delay: crate::DEFAULT_MAX_DELAY,
            backoff_multiplier: 2.0,
            jitter: true,
            retryable_classes: vec![
                ErrorKind::Connection,
                ErrorKind::Timeout,
                ErrorKind::RateLimit,
            ],
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// A configuration for high-reliability scenarios: more attempts,
    /// tighter initial spacing.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(15),
            ..Default::default()
        }
    }

    /// Set the maximum number of attempts, including the first call.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the backoff strategy.
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the base delay fed into the strategy.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the hard cap on any computed delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate settings, rejecting values the policy cannot honor.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.max_attempts == 0 {
            return Err(ProviderError::Configuration {
                message: "max_attempts must be at least 1".to_string(),
            });
        }
        if self.max_delay < self.base_delay {
            return Err(ProviderError::Configuration {
                message: "max_delay must not be smaller than base_delay".to_string(),
            });
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ProviderError::Configuration {
                message: "backoff_multiplier must be at least 1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of a retry decision. Computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether another attempt should be made
    pub should_retry: bool,
    /// How long to wait before that attempt
    pub delay: Duration,
}

impl RetryDecision {
    fn give_up() -> Self {
        Self {
            should_retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Pure retry decision calculator.
///
/// Holds no mutable state and performs no I/O; given an error class and a
/// 1-indexed attempt number it answers whether to retry and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Maximum attempts this policy allows, including the first call.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Decide whether attempt `attempt` (1-indexed) should be followed by
    /// another try, and with what delay.
    pub fn decide(&self, class: &ErrorClass, attempt: u32) -> RetryDecision {
        if attempt >= self.config.max_attempts {
            return RetryDecision::give_up();
        }

        let kind = class.kind();
        if matches!(kind, ErrorKind::Auth | ErrorKind::InvalidResponse) {
            return RetryDecision::give_up();
        }
        if !self.config.retryable_classes.contains(&kind) {
            return RetryDecision::give_up();
        }

        RetryDecision {
            should_retry: true,
            delay: self.compute_delay(class, attempt),
        }
    }

    /// Delay for the given attempt, after the retry-after override, the
    /// `[0, max_delay]` clamp, and jitter.
    fn compute_delay(&self, class: &ErrorClass, attempt: u32) -> Duration {
        // An explicit server-provided retry-after overrides the strategy and
        // is never jittered, but the cap still applies.
        if let ErrorClass::RateLimit {
            retry_after: Some(server_delay),
        } = class
        {
            return (*server_delay).min(self.config.max_delay);
        }

        let base = self.config.base_delay.as_millis() as f64;
        let raw = match self.config.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Exponential => {
                base * self.config.backoff_multiplier.powi(attempt as i32 - 1)
            }
            BackoffStrategy::Linear => base * attempt as f64,
            BackoffStrategy::Fibonacci => base * fibonacci(attempt - 1) as f64,
        };

        let capped = raw.min(self.config.max_delay.as_millis() as f64).max(0.0);
        let delay_ms = if self.config.jitter {
            capped * (0.5 + rand::random::<f64>() * 0.5)
        } else {
            capped
        };

        Duration::from_millis(delay_ms as u64)
    }
}

/// `fib(0) = fib(1) = 1`, saturating on overflow.
fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn policy(strategy: BackoffStrategy) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts: 25,
            strategy,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_fibonacci_sequence() {
        let seq: Vec<u64> = (0..8).map(fibonacci).collect();
        assert_eq!(seq, vec![1, 1, 2, 3, 5, 8, 13, 21]);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = policy(BackoffStrategy::Fixed);
        for attempt in 1..5 {
            let decision = policy.decide(&ErrorClass::Connection, attempt);
            assert!(decision.should_retry);
            assert_eq!(decision.delay, Duration::from_millis(100));
        }
    }

    #[test]
    fn test_exponential_delay() {
        let policy = policy(BackoffStrategy::Exponential);
        assert_eq!(
            policy.decide(&ErrorClass::Connection, 1).delay,
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.decide(&ErrorClass::Connection, 2).delay,
            Duration::from_millis(200)
        );
        assert_eq!(
            policy.decide(&ErrorClass::Connection, 3).delay,
            Duration::from_millis(400)
        );
    }

    #[test]
    fn test_linear_delay() {
        let policy = policy(BackoffStrategy::Linear);
        assert_eq!(
            policy.decide(&ErrorClass::Timeout, 3).delay,
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_fibonacci_delay() {
        let policy = policy(BackoffStrategy::Fibonacci);
        assert_eq!(
            policy.decide(&ErrorClass::Timeout, 1).delay,
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.decide(&ErrorClass::Timeout, 5).delay,
            Duration::from_millis(500)
        );
    }

    #[test_case(BackoffStrategy::Fixed)]
    #[test_case(BackoffStrategy::Exponential)]
    #[test_case(BackoffStrategy::Linear)]
    #[test_case(BackoffStrategy::Fibonacci)]
    fn test_delay_within_bounds(strategy: BackoffStrategy) {
        let policy = policy(strategy);
        for attempt in 1..=20 {
            let decision = policy.decide(&ErrorClass::Connection, attempt);
            assert!(decision.delay <= Duration::from_secs(10));
        }
    }

    #[test_case(BackoffStrategy::Exponential)]
    #[test_case(BackoffStrategy::Linear)]
    #[test_case(BackoffStrategy::Fibonacci)]
    fn test_delay_non_decreasing(strategy: BackoffStrategy) {
        let policy = policy(strategy);
        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = policy.decide(&ErrorClass::Connection, attempt).delay;
            assert!(delay >= previous, "delay shrank at attempt {attempt}");
            previous = delay;
        }
    }

    #[test]
    fn test_max_attempts_stops_retry() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            jitter: false,
            ..Default::default()
        });
        assert!(policy.decide(&ErrorClass::Connection, 2).should_retry);
        assert!(!policy.decide(&ErrorClass::Connection, 3).should_retry);
        assert!(!policy.decide(&ErrorClass::Connection, 4).should_retry);
    }

    #[test]
    fn test_auth_and_invalid_response_never_retried() {
        let policy = RetryPolicy::new(RetryConfig::default());
        assert!(!policy.decide(&ErrorClass::Auth, 1).should_retry);
        assert!(!policy.decide(&ErrorClass::InvalidResponse, 1).should_retry);
    }

    #[test]
    fn test_auth_refused_even_if_allow_listed() {
        let policy = RetryPolicy::new(RetryConfig {
            retryable_classes: vec![ErrorKind::Auth, ErrorKind::Connection],
            ..Default::default()
        });
        assert!(!policy.decide(&ErrorClass::Auth, 1).should_retry);
        assert!(policy.decide(&ErrorClass::Connection, 1).should_retry);
    }

    #[test]
    fn test_retry_after_overrides_strategy() {
        let policy = policy(BackoffStrategy::Exponential);
        let class = ErrorClass::RateLimit {
            retry_after: Some(Duration::from_secs(5)),
        };
        assert_eq!(policy.decide(&class, 1).delay, Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_capped_by_max_delay() {
        let policy = policy(BackoffStrategy::Fixed);
        let class = ErrorClass::RateLimit {
            retry_after: Some(Duration::from_secs(120)),
        };
        assert_eq!(policy.decide(&class, 1).delay, Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 10,
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_millis(1000),
            jitter: true,
            ..Default::default()
        });
        for _ in 0..50 {
            let delay = policy.decide(&ErrorClass::Connection, 1).delay;
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(RetryConfig::default().validate().is_ok());

        let zero_attempts = RetryConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_attempts.validate(),
            Err(ProviderError::Configuration { .. })
        ));

        let inverted = RetryConfig {
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
        assert_eq!(RetryConfig::aggressive().max_attempts, 5);
        assert!(RetryConfig::aggressive().validate().is_ok());
    }
}
