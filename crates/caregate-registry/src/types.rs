//! Domain types for the service registry.
//!
//! Records are plain serializable snapshots; the store hands out copies
//! and never exposes its internal entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Health status as determined by health probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// Uptime as self-reported by a service's health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Uptime {
    /// Uptime in seconds.
    Seconds(f64),
    /// Free-form text such as `"3 days"`.
    Text(String),
}

/// Current state of one registered downstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    /// Base URL; the health endpoint is this URL plus the configured health path.
    pub url: String,
    pub status: HealthStatus,
    /// Unix timestamp (milliseconds) of the most recent completed check,
    /// or of registration if no check has completed yet.
    pub last_health_check: u64,
    /// Duration of the most recent probe attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<Uptime>,
}

/// Optional metadata carried in a successful health response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uptime: Option<Uptime>,
}

impl HealthReport {
    /// Parse a health response body. Anything that is not a JSON object
    /// with the expected fields yields an empty report.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

/// Aggregate counts across all registered services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub unknown: usize,
    /// Mean of all defined response times in milliseconds, `0.0` if none.
    pub average_response_time: f64,
}

/// Outcome of one scheduler round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub healthy: usize,
    pub total: usize,
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
