//! RegistryStore — the authoritative name → record map.
//!
//! The store is `Clone` + `Send` + `Sync` (backed by `Arc<RwLock<..>>`)
//! and can be shared across async tasks. Every read-modify-write happens
//! under a single write guard, so concurrent check completions for
//! different services never interfere.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::types::{epoch_millis, HealthReport, HealthStatus, RegistryStats, ServiceRecord};

/// Terminal result of one health check, as applied to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Healthy {
        response_time: Duration,
        report: HealthReport,
    },
    Unhealthy {
        response_time: Duration,
    },
}

struct Entry {
    record: ServiceRecord,
    /// Monotonic time of registration or of the last completed check.
    checked_at: Instant,
}

/// Thread-safe in-memory registry of downstream services.
#[derive(Clone)]
pub struct RegistryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    stale_after: Duration,
}

impl RegistryStore {
    /// Create an empty store. Records whose last check is older than
    /// `stale_after` are reported as `unknown` by [`get_with_health`].
    ///
    /// [`get_with_health`]: RegistryStore::get_with_health
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            stale_after,
        }
    }

    // Each mutation leaves the map consistent, so a poisoned lock is safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a service. The record starts out `unknown`.
    pub fn insert(&self, name: &str, url: &str, version: Option<String>) -> ServiceRecord {
        let mut entries = self.write();
        let previous = entries.get(name).map(|e| e.record.last_health_check);
        let record = ServiceRecord {
            name: name.to_string(),
            url: url.to_string(),
            status: HealthStatus::Unknown,
            last_health_check: epoch_millis().max(previous.unwrap_or(0)),
            response_time_ms: None,
            version,
            uptime: None,
        };
        entries.insert(
            name.to_string(),
            Entry {
                record: record.clone(),
                checked_at: Instant::now(),
            },
        );
        debug!(service = %name, %url, replaced = previous.is_some(), "service registered");
        record
    }

    /// Remove a service. Returns true if it existed.
    pub fn remove(&self, name: &str) -> bool {
        let existed = self.write().remove(name).is_some();
        if existed {
            debug!(service = %name, "service unregistered");
        }
        existed
    }

    /// Snapshot of one record.
    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.read().get(name).map(|e| e.record.clone())
    }

    /// Snapshot of one record after staleness correction.
    ///
    /// A record that has not completed a check within `stale_after` is
    /// downgraded to `unknown`, and the downgrade is persisted.
    pub fn get_with_health(&self, name: &str) -> Option<ServiceRecord> {
        let mut entries = self.write();
        let entry = entries.get_mut(name)?;
        let age = entry.checked_at.elapsed();
        if age > self.stale_after && entry.record.status != HealthStatus::Unknown {
            debug!(
                service = %name,
                previous = ?entry.record.status,
                age_ms = age.as_millis() as u64,
                "record is stale, marking unknown"
            );
            entry.record.status = HealthStatus::Unknown;
        }
        Some(entry.record.clone())
    }

    /// Record the outcome of a completed check.
    ///
    /// Returns `None` without creating anything if the service is no
    /// longer registered.
    pub fn apply_outcome(&self, name: &str, outcome: CheckOutcome) -> Option<ServiceRecord> {
        let mut entries = self.write();
        let entry = entries.get_mut(name)?;
        let record = &mut entry.record;

        match outcome {
            CheckOutcome::Healthy {
                response_time,
                report,
            } => {
                record.status = HealthStatus::Healthy;
                record.response_time_ms = Some(response_time.as_millis() as u64);
                if report.version.is_some() {
                    record.version = report.version;
                }
                if report.uptime.is_some() {
                    record.uptime = report.uptime;
                }
            }
            CheckOutcome::Unhealthy { response_time } => {
                record.status = HealthStatus::Unhealthy;
                record.response_time_ms = Some(response_time.as_millis() as u64);
            }
        }
        record.last_health_check = record.last_health_check.max(epoch_millis());
        entry.checked_at = entry.checked_at.max(Instant::now());
        Some(record.clone())
    }

    /// Names of all registered services.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn list_all(&self) -> Vec<ServiceRecord> {
        self.read().values().map(|e| e.record.clone()).collect()
    }

    pub fn list_healthy(&self) -> Vec<ServiceRecord> {
        self.read()
            .values()
            .filter(|e| e.record.status == HealthStatus::Healthy)
            .map(|e| e.record.clone())
            .collect()
    }

    /// Aggregate counts and mean response time.
    pub fn stats(&self) -> RegistryStats {
        let entries = self.read();
        let mut stats = RegistryStats {
            total: entries.len(),
            ..Default::default()
        };
        let mut timed = 0u64;
        let mut sum_ms = 0u64;

        for entry in entries.values() {
            match entry.record.status {
                HealthStatus::Healthy => stats.healthy += 1,
                HealthStatus::Unhealthy => stats.unhealthy += 1,
                HealthStatus::Unknown => stats.unknown += 1,
            }
            if let Some(ms) = entry.record.response_time_ms {
                timed += 1;
                sum_ms += ms;
            }
        }

        if timed > 0 {
            stats.average_response_time = sum_ms as f64 / timed as f64;
        }
        stats
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
