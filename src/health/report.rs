//! Health snapshot shapes consumed by alerting and external reporting.

use crate::alerts::{AlertCondition, AlertSeverity};
use crate::endpoint::ModelType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Overall status of the monitored endpoint fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Every endpoint is healthy
    Healthy,
    /// Some endpoints are unhealthy
    Degraded,
    /// No endpoint is healthy
    Unhealthy,
}

/// Health entry for one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealth {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model_name: String,
    /// Kind of model served
    pub model_type: ModelType,
    /// Whether the most recent probe succeeded
    pub is_healthy: bool,
    /// Latency of the most recent successful probe, in milliseconds
    pub latency_ms: Option<u64>,
    /// Lifetime success rate of the record
    pub success_rate: f64,
    /// Failed probes since the last success
    pub consecutive_failures: u32,
    /// Total probes recorded
    pub total_checks: u64,
    /// Message from the most recent failed probe
    pub last_error: Option<String>,
}

/// Rollup for all endpoints of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    /// Endpoints configured for this provider
    pub total: usize,
    /// Currently healthy endpoints
    pub healthy: usize,
    /// Currently unhealthy endpoints
    pub unhealthy: usize,
    /// Average last-probe latency across endpoints with a known latency
    pub avg_latency_ms: Option<f64>,
}

/// Alert-worthy condition derived from health records.
#[derive(Debug, Clone, Serialize)]
pub struct HealthAlert {
    /// Desired severity for this condition
    pub severity: AlertSeverity,
    /// Human-readable description
    pub message: String,
    /// Endpoint key or provider name the condition concerns
    pub component: String,
    /// Failed probes since the last success, when relevant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
    /// Structured condition, mapped to a deterministic alert id by the
    /// alert manager
    pub condition: AlertCondition,
}

/// Point-in-time health snapshot of every monitored endpoint.
///
/// Published by the health probe, polled by the alert manager, and exposed
/// as-is to external reporting surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Fleet-wide status
    pub overall_status: OverallStatus,
    /// Number of monitored endpoints
    pub total_endpoints: usize,
    /// Endpoints whose most recent probe succeeded
    pub healthy_count: usize,
    /// Endpoints whose most recent probe failed
    pub unhealthy_count: usize,
    /// When any endpoint was last probed
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Per-endpoint entries, keyed by `provider:type:name`
    pub endpoints: HashMap<String, EndpointHealth>,
    /// Per-provider rollups
    pub providers: HashMap<String, ProviderHealth>,
    /// Endpoint-level alert conditions derived from the records
    pub alerts: Vec<HealthAlert>,
}

impl HealthReport {
    /// True when at least one endpoint is healthy, or nothing is monitored.
    pub fn is_serviceable(&self) -> bool {
        self.total_endpoints == 0 || self.healthy_count > 0
    }
}
