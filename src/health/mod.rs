//! Endpoint health probing and reporting.

mod probe;
mod report;

pub use probe::{CanaryOperation, HealthCheckConfig, HealthProbe, HealthRecord, ProbeResult};
pub use report::{
    EndpointHealth, HealthAlert, HealthReport, OverallStatus, ProviderHealth,
};
