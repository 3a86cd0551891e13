//! Health probing feeding the alert manager, through the public API.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use model_resilience::{
    AlertConfig, AlertManager, AlertSeverity, CanaryOperation, EndpointIdentity, HealthCheckConfig,
    HealthProbe, MemoryAlertSink, ModelType, OverallStatus, ProviderError, ProviderResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct SwitchableCanary {
    fail: AtomicBool,
}

impl SwitchableCanary {
    fn healthy() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(true),
        })
    }

    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CanaryOperation for SwitchableCanary {
    async fn check(&self) -> ProviderResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(ProviderError::Connection {
                message: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn probe() -> HealthProbe {
    HealthProbe::new(HealthCheckConfig {
        probe_interval: Duration::from_millis(20),
        probe_timeout: Duration::from_millis(100),
        ..Default::default()
    })
}

#[tokio::test]
async fn unhealthy_fleet_raises_and_resolves_alerts() {
    let probe = probe();
    let llm = EndpointIdentity::new("anthropic", "claude-sonnet", ModelType::Llm);
    let canary = SwitchableCanary::failing();
    probe.register(llm, canary.clone());

    let manager = AlertManager::new(AlertConfig::default());
    let sink = Arc::new(MemoryAlertSink::new());
    manager.add_sink(sink.clone());

    probe.run_probe_pass().await;
    let report = probe.report();
    assert_eq!(report.overall_status, OverallStatus::Unhealthy);

    let raised = manager.evaluate(&report).await;
    assert_eq!(raised.len(), 2);
    assert!(raised.iter().any(|a| a.id == "system:unhealthy"));
    assert!(raised
        .iter()
        .any(|a| a.id == "model:anthropic:llm:claude-sonnet"));
    assert_eq!(sink.delivered().len(), 2);

    // Same ongoing condition: no new alerts.
    probe.run_probe_pass().await;
    let raised = manager.evaluate(&probe.report()).await;
    assert!(raised.is_empty());
    assert_eq!(sink.delivered().len(), 2);

    // Endpoint recovers: alerts auto-resolve.
    canary.set_failing(false);
    probe.run_probe_pass().await;
    let report = probe.report();
    assert_eq!(report.overall_status, OverallStatus::Healthy);
    manager.evaluate(&report).await;
    assert!(manager.get_active().is_empty());
}

#[tokio::test]
async fn degraded_fleet_raises_provider_alert_only() {
    let probe = probe();
    probe.register(
        EndpointIdentity::new("openai", "gpt-4o", ModelType::Llm),
        SwitchableCanary::healthy(),
    );
    probe.register(
        EndpointIdentity::new("openai", "text-embedding-3-small", ModelType::Embedding),
        SwitchableCanary::failing(),
    );

    probe.run_probe_pass().await;
    let report = probe.report();
    assert_eq!(report.overall_status, OverallStatus::Degraded);
    assert!(report.is_serviceable());

    let manager = AlertManager::new(AlertConfig::default());
    let raised = manager.evaluate(&report).await;

    let ids: Vec<&str> = raised.iter().map(|a| a.id.as_str()).collect();
    assert!(ids.contains(&"provider:openai:degraded"));
    assert!(ids.contains(&"model:openai:embedding:text-embedding-3-small"));
    assert!(!ids.contains(&"system:unhealthy"));
}

#[tokio::test]
async fn consecutive_failures_escalate_endpoint_severity() {
    let probe = HealthProbe::new(HealthCheckConfig {
        probe_interval: Duration::from_millis(20),
        probe_timeout: Duration::from_millis(100),
        max_consecutive_failures: 4,
        ..Default::default()
    });
    let llm = EndpointIdentity::new("anthropic", "claude-sonnet", ModelType::Llm);
    probe.register(llm, SwitchableCanary::failing());

    probe.run_probe_pass().await;
    let first = probe.report();
    assert_eq!(first.alerts[0].severity, AlertSeverity::Warning);

    probe.run_probe_pass().await;
    let second = probe.report();
    assert_eq!(second.alerts[0].severity, AlertSeverity::Error);
    assert_eq!(second.alerts[0].consecutive_failures, Some(2));
}

#[tokio::test]
async fn startup_check_gates_on_one_healthy_endpoint() {
    let probe = probe();
    let canary = SwitchableCanary::failing();
    probe.register(
        EndpointIdentity::new("cohere", "rerank-v3", ModelType::Reranking),
        canary.clone(),
    );

    assert!(probe.run_startup_check().await.is_err());

    canary.set_failing(false);
    let report = probe.run_startup_check().await.unwrap();
    assert_eq!(report.healthy_count, 1);
}

#[tokio::test]
async fn periodic_probing_keeps_reports_current() {
    let probe = Arc::new(probe());
    let llm = EndpointIdentity::new("anthropic", "claude-sonnet", ModelType::Llm);
    let canary = SwitchableCanary::healthy();
    probe.register(llm.clone(), canary.clone());

    probe.start_periodic();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(probe.report().endpoints[&llm.key()].is_healthy);

    canary.set_failing(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!probe.report().endpoints[&llm.key()].is_healthy);

    probe.stop().await;
}
