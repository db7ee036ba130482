//! REST API handlers.
//!
//! Each handler reads/writes via `ServiceRegistry` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::debug;

use caregate_registry::config::{validate_name, validate_url};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn not_found(name: &str) -> axum::response::Response {
    error_response(&format!("service not found: {name}"), StatusCode::NOT_FOUND).into_response()
}

// ── Services ───────────────────────────────────────────────────

/// GET /api/v1/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    let mut services = state.registry.list_all();
    services.sort_by(|a, b| a.name.cmp(&b.name));
    ApiResponse::ok(services)
}

/// GET /api/v1/services/healthy
pub async fn list_healthy_services(State(state): State<ApiState>) -> impl IntoResponse {
    let mut services = state.registry.list_healthy();
    services.sort_by(|a, b| a.name.cmp(&b.name));
    ApiResponse::ok(services)
}

/// GET /api/v1/services/:name
pub async fn get_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_with_health(&name) {
        Some(record) => ApiResponse::ok(record).into_response(),
        None => not_found(&name),
    }
}

/// Registration request body.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// POST /api/v1/services
///
/// Responds as soon as the record exists; the first check runs in the
/// background.
pub async fn register_service(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_name(&req.name).and_then(|()| validate_url(&req.url)) {
        return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response();
    }

    drop(state.registry.register(&req.name, &req.url, req.version));
    match state.registry.get(&req.name) {
        Some(record) => (StatusCode::ACCEPTED, ApiResponse::ok(record)).into_response(),
        // Unregistered concurrently.
        None => not_found(&req.name),
    }
}

/// DELETE /api/v1/services/:name
pub async fn unregister_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    if state.registry.unregister(&name) {
        ApiResponse::ok("unregistered").into_response()
    } else {
        not_found(&name)
    }
}

/// POST /api/v1/services/:name/check
pub async fn force_check(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    debug!(service = %name, "forced health check requested");
    match state.registry.force_health_check(&name).await {
        Some(record) => ApiResponse::ok(record).into_response(),
        None => not_found(&name),
    }
}

// ── Aggregates ─────────────────────────────────────────────────

/// GET /api/v1/stats
pub async fn registry_stats(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.registry.stats())
}

/// GET /health
pub async fn gateway_health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "scheduler_running": state.registry.is_running(),
        "services": state.registry.stats().total,
    }))
}
