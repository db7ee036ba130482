//! caregate-api — REST API over the service registry.
//!
//! Lets the gateway's routing and reporting code (and operators) query
//! and manage the registry over HTTP.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/services` | List all services |
//! | POST | `/api/v1/services` | Register a service (checked immediately) |
//! | GET | `/api/v1/services/healthy` | List healthy services |
//! | GET | `/api/v1/services/{name}` | Get a service, stale records read `unknown` |
//! | DELETE | `/api/v1/services/{name}` | Unregister a service |
//! | POST | `/api/v1/services/{name}/check` | Force a health check now |
//! | GET | `/api/v1/stats` | Aggregate counts and mean response time |
//! | GET | `/health` | Liveness of the gateway itself |

pub mod handlers;

use axum::Router;
use axum::routing::{get, post};
use caregate_registry::ServiceRegistry;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: ServiceRegistry,
}

/// Build the complete API router.
pub fn build_router(registry: ServiceRegistry) -> Router {
    let state = ApiState { registry };

    let api_routes = Router::new()
        .route("/services", get(handlers::list_services).post(handlers::register_service))
        .route("/services/healthy", get(handlers::list_healthy_services))
        .route(
            "/services/{name}",
            get(handlers::get_service).delete(handlers::unregister_service),
        )
        .route("/services/{name}/check", post(handlers::force_check))
        .route("/stats", get(handlers::registry_stats))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::gateway_health).with_state(state))
}
