//! Alert delivery targets.

use super::Alert;
use crate::errors::ProviderResult;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Delivery target for raised alerts.
///
/// Sinks are fire-and-forget from the manager's perspective: a failing
/// sink is logged and never blocks delivery to the others.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert.
    async fn deliver(&self, alert: &Alert) -> ProviderResult<()>;

    /// Sink name, used in delivery-failure logs.
    fn name(&self) -> &str;
}

/// Emits alerts as structured log events.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn deliver(&self, alert: &Alert) -> ProviderResult<()> {
        match alert.severity {
            super::AlertSeverity::Critical | super::AlertSeverity::Error => {
                tracing::error!(
                    alert_id = %alert.id,
                    severity = %alert.severity,
                    component = %alert.component,
                    message = %alert.message,
                    "alert raised"
                );
            }
            _ => {
                tracing::warn!(
                    alert_id = %alert.id,
                    severity = %alert.severity,
                    component = %alert.component,
                    message = %alert.message,
                    "alert raised"
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Collects delivered alerts in memory, for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    delivered: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every alert delivered so far, oldest first.
    pub fn delivered(&self) -> Vec<Alert> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn deliver(&self, alert: &Alert) -> ProviderResult<()> {
        self.delivered.lock().push(alert.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
