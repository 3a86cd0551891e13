//! Top-level configuration.

use crate::alerts::AlertConfig;
use crate::errors::ProviderResult;
use crate::health::HealthCheckConfig;
use crate::resilience::RecoveryConfig;

/// Aggregate configuration for the whole subsystem.
///
/// Composes the recovery, health-check, and alerting settings so an
/// application can carry one value around and validate it in one place.
#[derive(Debug, Clone, Default)]
pub struct MonitorConfig {
    /// Retry, circuit-breaker, and fallback-cache settings
    pub recovery: RecoveryConfig,
    /// Health probing settings
    pub health: HealthCheckConfig,
    /// Alert lifecycle settings
    pub alerts: AlertConfig,
}

impl MonitorConfig {
    /// Defaults across every component.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the recovery settings.
    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    /// Set the health probing settings.
    pub fn with_health(mut self, health: HealthCheckConfig) -> Self {
        self.health = health;
        self
    }

    /// Set the alert lifecycle settings.
    pub fn with_alerts(mut self, alerts: AlertConfig) -> Self {
        self.alerts = alerts;
        self
    }

    /// Validate every component's settings.
    pub fn validate(&self) -> ProviderResult<()> {
        self.recovery.validate()?;
        self.health.validate()?;
        self.alerts.validate()?;
        Ok(())
    }
}
