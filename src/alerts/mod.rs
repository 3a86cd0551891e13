//! Alerting: deduplicated, cooldown-gated alerts derived from health
//! reports and fanned out to pluggable sinks.

mod manager;
mod sinks;

pub use manager::{AlertConfig, AlertManager};
pub use sinks::{AlertSink, MemoryAlertSink, TracingAlertSink};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational, no action required
    Info,
    /// Worth a look during working hours
    Warning,
    /// Needs attention soon
    Error,
    /// Needs attention now
    Critical,
}

impl AlertSeverity {
    /// Stable label used in logs and sink payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition an alert is raised for.
///
/// Each condition maps to a deterministic alert id, so the same ongoing
/// problem always deduplicates against itself no matter how many times it
/// is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertCondition {
    /// No endpoint in the fleet is healthy
    SystemUnhealthy,
    /// A specific endpoint is failing its health probes
    EndpointUnhealthy {
        /// Endpoint key, `provider:type:name`
        endpoint: String,
    },
    /// A specific endpoint's lifetime success rate fell below the floor
    EndpointLowSuccessRate {
        /// Endpoint key, `provider:type:name`
        endpoint: String,
    },
    /// A provider has at least one unhealthy endpoint
    ProviderDegraded {
        /// Provider name
        provider: String,
    },
}

impl AlertCondition {
    /// Deterministic id for deduplication.
    pub fn alert_id(&self) -> String {
        match self {
            Self::SystemUnhealthy => "system:unhealthy".to_string(),
            Self::EndpointUnhealthy { endpoint } => format!("model:{endpoint}"),
            Self::EndpointLowSuccessRate { endpoint } => {
                format!("model:{endpoint}:success-rate")
            }
            Self::ProviderDegraded { provider } => format!("provider:{provider}:degraded"),
        }
    }
}

/// A raised alert.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Deterministic id derived from the condition
    pub id: String,
    /// Severity at the time the alert was raised
    pub severity: AlertSeverity,
    /// Short summary
    pub title: String,
    /// Full description
    pub message: String,
    /// Endpoint key, provider name, or `"system"`
    pub component: String,
    /// When the alert was raised
    pub created_at: DateTime<Utc>,
    /// Whether the underlying condition has cleared
    pub resolved: bool,
    /// When the condition cleared
    pub resolved_at: Option<DateTime<Utc>>,
    /// Extra context for sinks
    pub metadata: HashMap<String, String>,
}
