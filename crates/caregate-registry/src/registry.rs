//! ServiceRegistry — the registry handle owned by the gateway process.
//!
//! Combines the store, the health checker, and a periodic scheduler loop.
//! The handle is cheap to clone; every clone observes the same services.
//!
//! ```text
//! ServiceRegistry
//!   ├── RegistryStore (name → ServiceRecord)
//!   ├── HealthChecker (probe, timeout, retries/backoff)
//!   └── scheduler loop (interval tick → fan-out checks → join → summary)
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::checker::{HealthChecker, HttpProbe, Probe};
use crate::config::RegistryConfig;
use crate::error::RegistryResult;
use crate::store::RegistryStore;
use crate::types::{CycleSummary, HealthStatus, RegistryStats, ServiceRecord};

/// Handle to the running scheduler loop.
struct SchedulerSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

struct Inner {
    config: RegistryConfig,
    interval: Duration,
    store: RegistryStore,
    checker: Arc<HealthChecker>,
    scheduler: Mutex<Option<SchedulerSlot>>,
}

/// Registry of downstream services and their health.
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<Inner>,
}

impl ServiceRegistry {
    /// Build a registry that probes over HTTP.
    ///
    /// Must be called from within a Tokio runtime: every bootstrap service
    /// gets an immediate check spawned before this returns.
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        Self::with_probe(config, Arc::new(HttpProbe))
    }

    /// Build a registry with a custom probe.
    pub fn with_probe(config: RegistryConfig, probe: Arc<dyn Probe>) -> RegistryResult<Self> {
        config.validate()?;
        let interval = config.interval()?;
        let store = RegistryStore::new(config.stale_after()?);
        let checker = Arc::new(HealthChecker::new(
            store.clone(),
            probe,
            config.health_path.clone(),
            config.timeout()?,
            config.max_retries,
        ));

        let registry = Self {
            inner: Arc::new(Inner {
                config,
                interval,
                store,
                checker,
                scheduler: Mutex::new(None),
            }),
        };

        for service in &registry.inner.config.services {
            registry.register(&service.name, &service.url, service.version.clone());
        }
        info!(
            services = registry.inner.config.services.len(),
            interval_ms = interval.as_millis() as u64,
            "service registry initialized"
        );
        Ok(registry)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Register (or re-register) a service and spawn an immediate check.
    ///
    /// The returned handle can be awaited for the check's record or simply
    /// dropped; check failures are logged, never returned.
    pub fn register(
        &self,
        name: &str,
        url: &str,
        version: Option<String>,
    ) -> JoinHandle<Option<ServiceRecord>> {
        self.inner.store.insert(name, url, version);
        info!(service = %name, %url, "service registered");

        let checker = Arc::clone(&self.inner.checker);
        let name = name.to_string();
        tokio::spawn(async move { checker.check(&name).await })
    }

    /// Remove a service. Returns true if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let existed = self.inner.store.remove(name);
        if existed {
            info!(service = %name, "service unregistered");
        } else {
            warn!(service = %name, "unregister for unknown service");
        }
        existed
    }

    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.inner.store.get(name)
    }

    /// Like [`get`](Self::get), with stale records reported as `unknown`.
    pub fn get_with_health(&self, name: &str) -> Option<ServiceRecord> {
        self.inner.store.get_with_health(name)
    }

    pub fn list_all(&self) -> Vec<ServiceRecord> {
        self.inner.store.list_all()
    }

    pub fn list_healthy(&self) -> Vec<ServiceRecord> {
        self.inner.store.list_healthy()
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.store.stats()
    }

    /// Check one service now, outside the scheduler's cadence.
    pub async fn force_health_check(&self, name: &str) -> Option<ServiceRecord> {
        self.inner.checker.check(name).await
    }

    /// Run one check round over every registered service.
    pub async fn check_all(&self) -> CycleSummary {
        run_cycle(&self.inner.checker).await
    }

    /// Start the periodic check loop, replacing any loop already running.
    pub fn start(&self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let checker = Arc::clone(&self.inner.checker);
        let interval = self.inner.interval;
        let handle = tokio::spawn(run_scheduler(checker, interval, shutdown_rx));

        let mut slot = self.scheduler_slot();
        if let Some(old) = slot.replace(SchedulerSlot {
            handle,
            shutdown_tx,
        }) {
            // Let the old loop finish its current round and exit.
            let _ = old.shutdown_tx.send(true);
            debug!("replaced running scheduler");
        }
        info!(interval_ms = interval.as_millis() as u64, "health check scheduler started");
    }

    /// Stop scheduling new rounds. Checks already in flight run to completion.
    pub fn stop(&self) {
        if let Some(old) = self.scheduler_slot().take() {
            let _ = old.shutdown_tx.send(true);
            drop(old.handle);
            info!("health check scheduler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler_slot()
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Stop the scheduler and forget every service.
    pub fn destroy(&self) {
        self.stop();
        self.inner.store.clear();
        info!("service registry destroyed");
    }

    fn scheduler_slot(&self) -> std::sync::MutexGuard<'_, Option<SchedulerSlot>> {
        self.inner
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The scheduler loop: one check round per interval until shutdown.
async fn run_scheduler(
    checker: Arc<HealthChecker>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; registration already checked everything.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(&checker).await;
            }
            _ = shutdown.changed() => {
                debug!("scheduler loop shutting down");
                break;
            }
        }
    }
}

/// Fan out one check per registered service and wait for all of them.
async fn run_cycle(checker: &Arc<HealthChecker>) -> CycleSummary {
    let names = checker.store().names();
    let mut checks = JoinSet::new();
    for name in names {
        let checker = Arc::clone(checker);
        checks.spawn(async move { checker.check(&name).await });
    }

    let mut summary = CycleSummary::default();
    while let Some(joined) = checks.join_next().await {
        match joined {
            Ok(Some(record)) => {
                summary.total += 1;
                if record.status == HealthStatus::Healthy {
                    summary.healthy += 1;
                }
            }
            // Unregistered while the round was running.
            Ok(None) => {}
            Err(e) => {
                summary.total += 1;
                error!(error = %e, "health check task failed");
            }
        }
    }

    if summary.healthy < summary.total {
        warn!(healthy = summary.healthy, total = summary.total, "health check round complete");
    } else {
        info!(healthy = summary.healthy, total = summary.total, "health check round complete");
    }
    summary
}
