//! Alert lifecycle: raise, deduplicate, cool down, resolve, retain.

use super::sinks::AlertSink;
use super::{Alert, AlertCondition, AlertSeverity};
use crate::clock::{Clock, SystemClock};
use crate::errors::{ProviderError, ProviderResult};
use crate::health::{HealthReport, OverallStatus};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for alert lifecycle management.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Minimum time between two firings of the same alert id
    pub cooldown: Duration,
    /// How long resolved alerts stay in the active set before being
    /// archived to history
    pub retention_window: Duration,
    /// Maximum number of archived alerts kept in history
    pub history_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown: crate::DEFAULT_ALERT_COOLDOWN,
            retention_window: Duration::from_secs(3600),
            history_capacity: 1000,
        }
    }
}

impl AlertConfig {
    /// Set the per-id cooldown window.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set how long resolved alerts linger before archival.
    pub fn with_retention_window(mut self, retention_window: Duration) -> Self {
        self.retention_window = retention_window;
        self
    }

    /// Set the archived-history capacity.
    pub fn with_history_capacity(mut self, history_capacity: usize) -> Self {
        self.history_capacity = history_capacity;
        self
    }

    /// Validate settings.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.history_capacity == 0 {
            return Err(ProviderError::Configuration {
                message: "history_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

struct Candidate {
    condition: AlertCondition,
    severity: AlertSeverity,
    title: String,
    message: String,
    component: String,
    metadata: HashMap<String, String>,
}

#[derive(Default)]
struct Registry {
    active: HashMap<String, Alert>,
    history: VecDeque<Alert>,
    last_fired: HashMap<String, DateTime<Utc>>,
}

/// Turns health reports into deduplicated alerts and fans them out to
/// registered sinks.
///
/// `evaluate` is idempotent for an unchanged report: an ongoing condition
/// raises exactly one alert, which auto-resolves once the condition clears
/// and is archived after the retention window.
pub struct AlertManager {
    config: AlertConfig,
    clock: Arc<dyn Clock>,
    sinks: RwLock<Vec<Arc<dyn AlertSink>>>,
    registry: Mutex<Registry>,
}

impl AlertManager {
    /// Create a manager using the system clock.
    pub fn new(config: AlertConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager with an injected clock. Tests use this with a
    /// manual clock to step through cooldown and retention windows.
    pub fn with_clock(config: AlertConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            sinks: RwLock::new(Vec::new()),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Register a delivery sink.
    pub fn add_sink(&self, sink: Arc<dyn AlertSink>) {
        self.sinks.write().push(sink);
    }

    /// Evaluate a health report: archive stale resolved alerts, raise new
    /// alerts for conditions not already active or cooling down, resolve
    /// active alerts whose condition has cleared, and deliver anything new
    /// to every sink. Returns the newly raised alerts.
    pub async fn evaluate(&self, report: &HealthReport) -> Vec<Alert> {
        let now = self.clock.now();
        let candidates = self.candidates(report);

        let raised = {
            let mut registry = self.registry.lock();
            self.sweep_resolved(&mut registry, now);

            let current_ids: HashSet<String> =
                candidates.iter().map(|c| c.condition.alert_id()).collect();

            // Resolve actives whose condition no longer holds.
            for alert in registry.active.values_mut() {
                if !alert.resolved && !current_ids.contains(&alert.id) {
                    alert.resolved = true;
                    alert.resolved_at = Some(now);
                    tracing::info!(alert_id = %alert.id, "alert resolved");
                }
            }

            let mut raised = Vec::new();
            for candidate in candidates {
                let id = candidate.condition.alert_id();

                if registry.active.get(&id).is_some_and(|a| !a.resolved) {
                    continue;
                }
                if let Some(fired_at) = registry.last_fired.get(&id) {
                    let since = (now - *fired_at)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    if since < self.config.cooldown {
                        tracing::debug!(alert_id = %id, "alert suppressed by cooldown");
                        continue;
                    }
                }

                let alert = Alert {
                    id: id.clone(),
                    severity: candidate.severity,
                    title: candidate.title,
                    message: candidate.message,
                    component: candidate.component,
                    created_at: now,
                    resolved: false,
                    resolved_at: None,
                    metadata: candidate.metadata,
                };
                if let Some(previous) = registry.active.insert(id.clone(), alert.clone()) {
                    if previous.resolved {
                        Self::archive(&mut registry, self.config.history_capacity, previous);
                    }
                }
                registry.last_fired.insert(id, now);
                raised.push(alert);
            }
            raised
        };

        // Deliver outside the registry lock so slow sinks cannot stall
        // concurrent evaluation or reads.
        if !raised.is_empty() {
            let sinks: Vec<Arc<dyn AlertSink>> = self.sinks.read().clone();
            for alert in &raised {
                for sink in &sinks {
                    if let Err(error) = sink.deliver(alert).await {
                        tracing::warn!(
                            sink = sink.name(),
                            alert_id = %alert.id,
                            %error,
                            "alert delivery failed"
                        );
                    }
                }
            }
        }

        raised
    }

    /// Manually resolve an active alert by id. Returns false when no
    /// unresolved alert with that id exists.
    pub fn resolve(&self, alert_id: &str) -> bool {
        let now = self.clock.now();
        let mut registry = self.registry.lock();
        match registry.active.get_mut(alert_id) {
            Some(alert) if !alert.resolved => {
                alert.resolved = true;
                alert.resolved_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Unresolved alerts, most severe first.
    pub fn get_active(&self) -> Vec<Alert> {
        let registry = self.registry.lock();
        let mut active: Vec<Alert> = registry
            .active
            .values()
            .filter(|a| !a.resolved)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.id.cmp(&b.id)));
        active
    }

    /// Archived alerts, newest first, limited to `limit` entries.
    pub fn get_history(&self, limit: usize) -> Vec<Alert> {
        let registry = self.registry.lock();
        registry.history.iter().rev().take(limit).cloned().collect()
    }

    fn sweep_resolved(&self, registry: &mut Registry, now: DateTime<Utc>) {
        let expired: Vec<String> = registry
            .active
            .iter()
            .filter(|(_, alert)| {
                alert.resolved_at.is_some_and(|resolved_at| {
                    (now - resolved_at).to_std().unwrap_or(Duration::ZERO)
                        >= self.config.retention_window
                })
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(alert) = registry.active.remove(&id) {
                Self::archive(registry, self.config.history_capacity, alert);
            }
        }
    }

    fn archive(registry: &mut Registry, capacity: usize, alert: Alert) {
        if registry.history.len() >= capacity {
            registry.history.pop_front();
        }
        registry.history.push_back(alert);
    }

    fn candidates(&self, report: &HealthReport) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        if report.overall_status == OverallStatus::Unhealthy {
            candidates.push(Candidate {
                condition: AlertCondition::SystemUnhealthy,
                severity: AlertSeverity::Critical,
                title: "all model endpoints unhealthy".to_string(),
                message: format!(
                    "none of the {} monitored endpoints is passing health checks",
                    report.total_endpoints
                ),
                component: "system".to_string(),
                metadata: HashMap::from([(
                    "total_endpoints".to_string(),
                    report.total_endpoints.to_string(),
                )]),
            });
        }

        for health_alert in &report.alerts {
            let mut metadata = HashMap::new();
            if let Some(failures) = health_alert.consecutive_failures {
                metadata.insert("consecutive_failures".to_string(), failures.to_string());
            }
            candidates.push(Candidate {
                condition: health_alert.condition.clone(),
                severity: health_alert.severity,
                title: format!("endpoint {} needs attention", health_alert.component),
                message: health_alert.message.clone(),
                component: health_alert.component.clone(),
                metadata,
            });
        }

        // Provider rollup alerts only make sense while part of the fleet
        // still works; a fully-unhealthy system is covered above.
        if report.overall_status == OverallStatus::Degraded {
            let mut degraded: Vec<(&String, &crate::health::ProviderHealth)> = report
                .providers
                .iter()
                .filter(|(_, p)| p.unhealthy > 0)
                .collect();
            degraded.sort_by_key(|(provider, _)| provider.clone());
            for (provider, rollup) in degraded {
                candidates.push(Candidate {
                    condition: AlertCondition::ProviderDegraded {
                        provider: provider.clone(),
                    },
                    severity: AlertSeverity::Warning,
                    title: format!("provider {provider} degraded"),
                    message: format!(
                        "{} of {} endpoints for provider {} are unhealthy",
                        rollup.unhealthy, rollup.total, provider
                    ),
                    component: provider.clone(),
                    metadata: HashMap::from([
                        ("healthy".to_string(), rollup.healthy.to_string()),
                        ("unhealthy".to_string(), rollup.unhealthy.to_string()),
                    ]),
                });
            }
        }

        candidates
    }
}
