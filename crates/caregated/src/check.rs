//! Check mode — one round over the configured services, then exit.

use std::sync::Arc;

use caregate_registry::{
    CycleSummary, HealthStatus, HttpProbe, Probe, RegistryConfig, ServiceRegistry,
};
use tracing::error;

/// Check every configured service once and print records and stats.
///
/// Returns whether every service ended up healthy.
pub async fn run_check(config: RegistryConfig) -> anyhow::Result<bool> {
    let (summary, report) = check_services(config, Arc::new(HttpProbe)).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(summary.healthy == summary.total)
}

/// Register each configured service and wait for its registration check.
///
/// The registration check is the round: no scheduler runs and no second
/// pass follows, so every service is checked exactly once.
async fn check_services(
    mut config: RegistryConfig,
    probe: Arc<dyn Probe>,
) -> anyhow::Result<(CycleSummary, serde_json::Value)> {
    let services = std::mem::take(&mut config.services);
    let registry = ServiceRegistry::with_probe(config, probe)?;

    let checks: Vec<_> = services
        .iter()
        .map(|s| registry.register(&s.name, &s.url, s.version.clone()))
        .collect();

    let mut summary = CycleSummary::default();
    for check in checks {
        summary.total += 1;
        match check.await {
            Ok(Some(record)) if record.status == HealthStatus::Healthy => summary.healthy += 1,
            Ok(_) => {}
            Err(e) => error!(error = %e, "health check task failed"),
        }
    }

    let mut records = registry.list_all();
    records.sort_by(|a, b| a.name.cmp(&b.name));
    let report = serde_json::json!({
        "services": records,
        "stats": registry.stats(),
    });

    registry.destroy();
    Ok((summary, report))
}
