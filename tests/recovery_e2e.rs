//! End-to-end recovery scenarios through the public API.

use model_resilience::{
    BackoffStrategy, CircuitBreakerConfig, CircuitState, EndpointIdentity, FallbackChain,
    ModelType, ProviderError, ProviderResult, RecoveryConfig, RecoveryCoordinator, RetryConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn fast_config() -> RecoveryConfig {
    RecoveryConfig {
        retry: RetryConfig {
            max_attempts: 3,
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_millis(5),
            jitter: false,
            ..Default::default()
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_millis(50),
        },
        ..Default::default()
    }
}

fn llm_endpoint() -> EndpointIdentity {
    EndpointIdentity::new("anthropic", "claude-sonnet", ModelType::Llm)
}

#[tokio::test]
async fn transient_failures_recover_without_fallback() {
    let coordinator = RecoveryCoordinator::new(fast_config());
    let calls = Arc::new(AtomicU32::new(0));
    let backup_calls = Arc::new(AtomicU32::new(0));

    let calls_clone = calls.clone();
    let backup_clone = backup_calls.clone();
    let result = coordinator
        .run(
            &llm_endpoint(),
            move || {
                let calls = calls_clone.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ProviderError::Connection {
                            message: "connection reset".to_string(),
                        })
                    } else {
                        Ok("a fine answer".to_string())
                    }
                }
            },
            FallbackChain::none().with_backup(async move {
                backup_clone.fetch_add(1, Ordering::SeqCst);
                Ok("backup answer".to_string())
            }),
        )
        .await;

    assert_eq!(result.unwrap(), "a fine answer");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(backup_calls.load(Ordering::SeqCst), 0);

    let stats = coordinator.stats();
    assert_eq!(stats.total_errors, 2);
    assert_eq!(stats.successful_recoveries, 0);
}

#[tokio::test]
async fn persistent_failure_falls_back_to_backup_provider() {
    let coordinator = RecoveryCoordinator::new(fast_config());

    let result = coordinator
        .run(
            &llm_endpoint(),
            || async {
                Err(ProviderError::Timeout {
                    message: "deadline exceeded".to_string(),
                })
            },
            FallbackChain::none().with_backup(async { Ok("backup answer".to_string()) }),
        )
        .await;

    assert_eq!(result.unwrap(), "backup answer");
    let stats = coordinator.stats();
    assert_eq!(stats.total_errors, 3);
    assert_eq!(stats.recovery_attempts, 1);
    assert_eq!(stats.successful_recoveries, 1);
}

#[tokio::test]
async fn breaker_opens_and_recovers_across_calls() {
    let mut config = fast_config();
    config.retry.max_attempts = 1;
    config.circuit_breaker.failure_threshold = 2;
    let coordinator = RecoveryCoordinator::new(config);
    let target = llm_endpoint();

    for _ in 0..2 {
        let _: ProviderResult<String> = coordinator
            .run(
                &target,
                || async {
                    Err(ProviderError::Connection {
                        message: "refused".to_string(),
                    })
                },
                FallbackChain::none(),
            )
            .await;
    }
    assert_eq!(coordinator.breaker_state(&target), Some(CircuitState::Open));

    // While open, the live operation is never invoked.
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let result: ProviderResult<String> = coordinator
        .run(
            &target,
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("live".to_string())
                }
            },
            FallbackChain::none(),
        )
        .await;
    assert!(matches!(result, Err(ProviderError::CircuitOpen { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // After the open timeout a trial call closes the breaker again.
    tokio::time::sleep(Duration::from_millis(80)).await;
    let result = coordinator
        .run(
            &target,
            || async { Ok("recovered".to_string()) },
            FallbackChain::none(),
        )
        .await;
    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(
        coordinator.breaker_state(&target),
        Some(CircuitState::Closed)
    );
}

#[tokio::test]
async fn cached_response_serves_embedding_outage() {
    let coordinator = RecoveryCoordinator::new(fast_config());
    let embed = EndpointIdentity::new("openai", "text-embedding-3-small", ModelType::Embedding);

    let fresh = coordinator
        .run(
            &embed,
            || async { Ok(vec![0.25f32, 0.5, 0.75]) },
            FallbackChain::none().with_cache_key("embed:doc-42"),
        )
        .await
        .unwrap();

    let served: Vec<f32> = coordinator
        .run(
            &embed,
            || async {
                Err(ProviderError::Connection {
                    message: "refused".to_string(),
                })
            },
            FallbackChain::none().with_cache_key("embed:doc-42"),
        )
        .await
        .unwrap();

    assert_eq!(served, fresh);
}

#[tokio::test]
async fn full_chain_ends_in_degraded_response() {
    let coordinator = RecoveryCoordinator::new(fast_config());

    let chain = FallbackChain::none()
        .with_backup(async {
            Err(ProviderError::Connection {
                message: "backup also down".to_string(),
            })
        })
        .with_cache_key("qa:never-populated")
        .with_degraded(|| "[degraded] unable to reach any model".to_string());

    let result = coordinator
        .run(
            &llm_endpoint(),
            || async {
                Err(ProviderError::Timeout {
                    message: "deadline exceeded".to_string(),
                })
            },
            chain,
        )
        .await;

    assert_eq!(result.unwrap(), "[degraded] unable to reach any model");
    assert_eq!(coordinator.stats().successful_recoveries, 1);
}

#[tokio::test]
async fn auth_errors_are_never_retried() {
    let coordinator = RecoveryCoordinator::new(fast_config());
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result: ProviderResult<String> = coordinator
        .run(
            &llm_endpoint(),
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Authentication {
                        message: "invalid api key".to_string(),
                    })
                }
            },
            FallbackChain::none(),
        )
        .await;

    assert!(matches!(result, Err(ProviderError::Authentication { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
