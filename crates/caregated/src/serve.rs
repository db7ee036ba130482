//! Serve mode — the long-running gateway registry.

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::info;

use caregate_registry::{RegistryConfig, ServiceRegistry};

/// Run the registry and its API until Ctrl-C.
pub async fn run_serve(port: u16, config: RegistryConfig) -> anyhow::Result<()> {
    info!("caregate daemon starting");

    // Registers the bootstrap services and spawns their first checks.
    let registry = ServiceRegistry::new(config)?;
    registry.start();

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Stop scheduling new rounds as soon as shutdown begins.
    let scheduler_registry = registry.clone();
    let scheduler_guard = tokio::spawn(async move {
        let _ = shutdown_rx.changed().await;
        scheduler_registry.stop();
    });

    let router = caregate_api::build_router(registry.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = scheduler_guard.await;
    registry.stop();

    let stats = registry.stats();
    info!(
        healthy = stats.healthy,
        total = stats.total,
        "caregate daemon stopped"
    );
    Ok(())
}
