//! Periodic endpoint health probing.

use crate::alerts::{AlertCondition, AlertSeverity};
use crate::endpoint::EndpointIdentity;
use crate::errors::{ProviderError, ProviderResult};
use crate::health::report::{
    EndpointHealth, HealthAlert, HealthReport, OverallStatus, ProviderHealth,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A minimal representative call used purely to test endpoint liveness.
///
/// Supplied by the provider-client collaborator: "embed one short string",
/// "complete one short prompt", and so on. Never used to serve real traffic.
#[async_trait]
pub trait CanaryOperation: Send + Sync {
    /// Perform the canary call.
    async fn check(&self) -> ProviderResult<()>;
}

/// Configuration for health probing.
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// Time between scheduled probe passes
    pub probe_interval: Duration,
    /// Per-canary timeout within one pass
    pub probe_timeout: Duration,
    /// Consecutive-failure count treated as a hard failure threshold
    pub max_consecutive_failures: u32,
    /// Success-rate floor below which an endpoint is alert-worthy
    pub success_rate_floor: f64,
    /// Minimum samples before the success-rate floor applies
    pub min_samples: u64,
    /// Run one full probe pass before declaring the process ready
    pub enable_startup_check: bool,
    /// Run the periodic probe loop
    pub enable_periodic_check: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            probe_interval: crate::DEFAULT_PROBE_INTERVAL,
            probe_timeout: crate::DEFAULT_PROBE_TIMEOUT,
            max_consecutive_failures: 3,
            success_rate_floor: 0.5,
            min_samples: 5,
            enable_startup_check: true,
            enable_periodic_check: true,
        }
    }
}

impl HealthCheckConfig {
    /// Set the spacing between periodic probe passes.
    pub fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }

    /// Set the per-canary timeout.
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Set the success-rate floor and the sample count it applies from.
    pub fn with_success_rate_floor(mut self, floor: f64, min_samples: u64) -> Self {
        self.success_rate_floor = floor;
        self.min_samples = min_samples;
        self
    }

    /// Validate settings.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.probe_interval.is_zero() || self.probe_timeout.is_zero() {
            return Err(ProviderError::Configuration {
                message: "probe_interval and probe_timeout must be non-zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.success_rate_floor) {
            return Err(ProviderError::Configuration {
                message: "success_rate_floor must be within [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of one canary invocation.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Whether the canary succeeded within its timeout
    pub healthy: bool,
    /// Canary latency, when it completed
    pub latency: Option<Duration>,
    /// Failure message, when it did not succeed
    pub error: Option<String>,
    /// When the probe finished
    pub at: DateTime<Utc>,
}

/// Rolling health state for one endpoint.
///
/// `success_rate` is computed over the record's entire lifetime, not a
/// sliding window: a long-healthy endpoint with one recent failure shows a
/// nearly unaffected rate. This is deliberate, to keep alerting from
/// flapping on isolated failures; `consecutive_failures` is the signal for
/// recent trouble.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    /// Whether the most recent probe succeeded
    pub is_healthy: bool,
    /// Latency of the most recent successful probe
    pub last_latency: Option<Duration>,
    /// Message from the most recent failed probe
    pub last_error: Option<String>,
    /// Failed probes since the last success
    pub consecutive_failures: u32,
    /// Total probes recorded
    pub total_checks: u64,
    /// Lifetime success ratio
    pub success_rate: f64,
    /// When the endpoint was last probed
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl HealthRecord {
    /// A fresh record: optimistic until the first probe lands.
    fn new() -> Self {
        Self {
            is_healthy: true,
            last_latency: None,
            last_error: None,
            consecutive_failures: 0,
            total_checks: 0,
            success_rate: 1.0,
            last_checked_at: None,
        }
    }

    fn apply(&mut self, result: &ProbeResult) {
        self.total_checks += 1;
        let checks = self.total_checks as f64;
        if result.healthy {
            self.is_healthy = true;
            self.consecutive_failures = 0;
            self.last_latency = result.latency;
            self.last_error = None;
            self.success_rate = (self.success_rate * (checks - 1.0) + 1.0) / checks;
        } else {
            self.is_healthy = false;
            self.consecutive_failures += 1;
            self.last_error = result.error.clone();
            self.success_rate = self.success_rate * (checks - 1.0) / checks;
        }
        self.last_checked_at = Some(result.at);
    }
}

struct ProbeTarget {
    endpoint: EndpointIdentity,
    canary: Arc<dyn CanaryOperation>,
}

struct PeriodicRunner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Probes every configured endpoint with its canary operation and keeps a
/// rolling [`HealthRecord`] per endpoint.
///
/// Records are mutated only by the probe; the alert manager and external
/// reporting read consistent snapshots via [`HealthProbe::report`].
pub struct HealthProbe {
    config: HealthCheckConfig,
    targets: RwLock<Vec<ProbeTarget>>,
    records: RwLock<HashMap<String, (EndpointIdentity, HealthRecord)>>,
    runner: Mutex<Option<PeriodicRunner>>,
}

impl HealthProbe {
    /// Create a probe with no registered endpoints.
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            targets: RwLock::new(Vec::new()),
            records: RwLock::new(HashMap::new()),
            runner: Mutex::new(None),
        }
    }

    /// Register an endpoint and the canary used to probe it.
    pub fn register(&self, endpoint: EndpointIdentity, canary: Arc<dyn CanaryOperation>) {
        let key = endpoint.key();
        self.records
            .write()
            .entry(key)
            .or_insert_with(|| (endpoint.clone(), HealthRecord::new()));
        self.targets.write().push(ProbeTarget { endpoint, canary });
    }

    /// Probe one endpoint with `canary`, bounded by the configured timeout,
    /// and fold the outcome into its health record.
    pub async fn probe_once(
        &self,
        endpoint: &EndpointIdentity,
        canary: &dyn CanaryOperation,
    ) -> ProbeResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.probe_timeout, canary.check()).await;
        let result = match outcome {
            Ok(Ok(())) => ProbeResult {
                healthy: true,
                latency: Some(started.elapsed()),
                error: None,
                at: Utc::now(),
            },
            Ok(Err(error)) => ProbeResult {
                healthy: false,
                latency: Some(started.elapsed()),
                error: Some(error.to_string()),
                at: Utc::now(),
            },
            Err(_) => ProbeResult {
                healthy: false,
                latency: None,
                error: Some("health check timed out".to_string()),
                at: Utc::now(),
            },
        };

        if !result.healthy {
            tracing::warn!(
                endpoint = %endpoint,
                error = result.error.as_deref().unwrap_or("unknown"),
                "health probe failed"
            );
        }

        let mut records = self.records.write();
        let (_, record) = records
            .entry(endpoint.key())
            .or_insert_with(|| (endpoint.clone(), HealthRecord::new()));
        record.apply(&result);
        result
    }

    /// Probe every registered endpoint once. Probes within a pass run
    /// concurrently as independent units of work.
    pub async fn run_probe_pass(&self) {
        let targets: Vec<(EndpointIdentity, Arc<dyn CanaryOperation>)> = self
            .targets
            .read()
            .iter()
            .map(|t| (t.endpoint.clone(), Arc::clone(&t.canary)))
            .collect();

        futures::future::join_all(targets.iter().map(|(endpoint, canary)| async move {
            self.probe_once(endpoint, canary.as_ref()).await;
        }))
        .await;
    }

    /// Run one synchronous probe pass before declaring the process ready.
    ///
    /// Readiness requires at least one healthy endpoint, not all of them.
    /// A probe with nothing registered is trivially ready.
    pub async fn run_startup_check(&self) -> ProviderResult<HealthReport> {
        if !self.config.enable_startup_check {
            return Ok(self.report());
        }
        self.run_probe_pass().await;
        let report = self.report();
        if report.is_serviceable() {
            Ok(report)
        } else {
            Err(ProviderError::Connection {
                message: "startup health check found no healthy endpoints".to_string(),
            })
        }
    }

    /// Start the periodic probe loop. A second call while running is a
    /// no-op, as is any call when periodic checks are disabled.
    pub fn start_periodic(self: &Arc<Self>) {
        if !self.config.enable_periodic_check {
            tracing::debug!("periodic health checks disabled by configuration");
            return;
        }
        let mut runner = self.runner.lock();
        if runner.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let probe = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(probe.config.probe_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        probe.run_probe_pass().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });
        *runner = Some(PeriodicRunner { shutdown, handle });
    }

    /// Stop the periodic loop, cancelling any in-progress wait promptly.
    pub async fn stop(&self) {
        let runner = self.runner.lock().take();
        if let Some(runner) = runner {
            let _ = runner.shutdown.send(true);
            let _ = runner.handle.await;
        }
    }

    /// Health record for one endpoint, if it is registered.
    pub fn record(&self, endpoint: &EndpointIdentity) -> Option<HealthRecord> {
        self.records
            .read()
            .get(&endpoint.key())
            .map(|(_, record)| record.clone())
    }

    /// Aggregate snapshot: overall status, per-endpoint entries,
    /// per-provider rollups, and derived alert conditions.
    pub fn report(&self) -> HealthReport {
        let records = self.records.read();

        let total_endpoints = records.len();
        let healthy_count = records.values().filter(|(_, r)| r.is_healthy).count();
        let unhealthy_count = total_endpoints - healthy_count;

        let overall_status = if total_endpoints == 0 || healthy_count == total_endpoints {
            OverallStatus::Healthy
        } else if healthy_count == 0 {
            OverallStatus::Unhealthy
        } else {
            OverallStatus::Degraded
        };

        let last_checked_at = records
            .values()
            .filter_map(|(_, r)| r.last_checked_at)
            .max();

        let mut endpoints = HashMap::new();
        let mut providers: HashMap<String, ProviderHealth> = HashMap::new();
        let mut provider_latencies: HashMap<String, Vec<f64>> = HashMap::new();
        let mut alerts = Vec::new();

        for (key, (endpoint, record)) in records.iter() {
            endpoints.insert(
                key.clone(),
                EndpointHealth {
                    provider: endpoint.provider.clone(),
                    model_name: endpoint.model_name.clone(),
                    model_type: endpoint.model_type,
                    is_healthy: record.is_healthy,
                    latency_ms: record.last_latency.map(|l| l.as_millis() as u64),
                    success_rate: record.success_rate,
                    consecutive_failures: record.consecutive_failures,
                    total_checks: record.total_checks,
                    last_error: record.last_error.clone(),
                },
            );

            let rollup = providers
                .entry(endpoint.provider.clone())
                .or_insert(ProviderHealth {
                    total: 0,
                    healthy: 0,
                    unhealthy: 0,
                    avg_latency_ms: None,
                });
            rollup.total += 1;
            if record.is_healthy {
                rollup.healthy += 1;
            } else {
                rollup.unhealthy += 1;
            }
            if let Some(latency) = record.last_latency {
                provider_latencies
                    .entry(endpoint.provider.clone())
                    .or_default()
                    .push(latency.as_secs_f64() * 1000.0);
            }

            self.derive_endpoint_alerts(key, record, &mut alerts);
        }

        for (provider, latencies) in provider_latencies {
            if let Some(rollup) = providers.get_mut(&provider) {
                rollup.avg_latency_ms =
                    Some(latencies.iter().sum::<f64>() / latencies.len() as f64);
            }
        }

        HealthReport {
            overall_status,
            total_endpoints,
            healthy_count,
            unhealthy_count,
            last_checked_at,
            endpoints,
            providers,
            alerts,
        }
    }

    fn derive_endpoint_alerts(&self, key: &str, record: &HealthRecord, alerts: &mut Vec<HealthAlert>) {
        if record.total_checks == 0 {
            return;
        }

        if !record.is_healthy {
            // Escalate once failures reach half the configured threshold.
            let half_threshold = self.config.max_consecutive_failures.div_ceil(2).max(1);
            let severity = if record.consecutive_failures >= half_threshold {
                AlertSeverity::Error
            } else {
                AlertSeverity::Warning
            };
            alerts.push(HealthAlert {
                severity,
                message: format!(
                    "endpoint {} is unhealthy: {}",
                    key,
                    record.last_error.as_deref().unwrap_or("unknown error")
                ),
                component: key.to_string(),
                consecutive_failures: Some(record.consecutive_failures),
                condition: AlertCondition::EndpointUnhealthy {
                    endpoint: key.to_string(),
                },
            });
        }

        if record.total_checks >= self.config.min_samples
            && record.success_rate < self.config.success_rate_floor
        {
            alerts.push(HealthAlert {
                severity: AlertSeverity::Warning,
                message: format!(
                    "endpoint {} success rate {:.1}% is below the {:.1}% floor",
                    key,
                    record.success_rate * 100.0,
                    self.config.success_rate_floor * 100.0
                ),
                component: key.to_string(),
                consecutive_failures: None,
                condition: AlertCondition::EndpointLowSuccessRate {
                    endpoint: key.to_string(),
                },
            });
        }
    }
}
