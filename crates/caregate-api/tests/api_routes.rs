//! Router-level tests.
//!
//! Drives the full axum router with `tower::ServiceExt::oneshot` against a
//! registry whose probe answers from an in-memory table.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use caregate_api::build_router;
use caregate_registry::{
    BoxFuture, HealthReport, Probe, ProbeResult, RegistryConfig, ServiceEntry, ServiceRegistry,
};

/// Answers 200 for the listed health urls and fails everything else.
struct TableProbe {
    up: HashMap<String, HealthReport>,
}

impl Probe for TableProbe {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult> {
        let result = match self.up.get(url) {
            Some(report) => ProbeResult::Healthy(report.clone()),
            None => ProbeResult::Failed {
                error: "connection refused".to_string(),
            },
        };
        Box::pin(async move { result })
    }
}

fn registry(services: &[(&str, bool)]) -> ServiceRegistry {
    let up = services
        .iter()
        .filter(|(_, ok)| *ok)
        .map(|(name, _)| {
            (
                format!("http://{name}:3000/health"),
                HealthReport {
                    version: Some("1.0.0".to_string()),
                    uptime: None,
                },
            )
        })
        .collect();
    let config = RegistryConfig {
        max_retries: 1,
        services: services
            .iter()
            .map(|(name, _)| ServiceEntry {
                name: name.to_string(),
                url: format!("http://{name}:3000"),
                version: None,
            })
            .collect(),
        ..Default::default()
    };
    ServiceRegistry::with_probe(config, Arc::new(TableProbe { up })).unwrap()
}

async fn json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    (status, json(resp).await)
}

async fn check_everything(registry: &ServiceRegistry) {
    registry.check_all().await;
}

#[tokio::test]
async fn stats_reflect_mixed_health() {
    let registry = registry(&[
        ("patient", true),
        ("doctor", true),
        ("appointment", true),
        ("billing", false),
    ]);
    check_everything(&registry).await;
    let router = build_router(registry);

    let (status, body) = get(&router, "/api/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total"], 4);
    assert_eq!(body["data"]["healthy"], 3);
    assert_eq!(body["data"]["unhealthy"], 1);
    assert_eq!(body["data"]["unknown"], 0);

    let (_, body) = get(&router, "/api/v1/services/healthy").await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["appointment", "doctor", "patient"]);
}

#[tokio::test]
async fn get_service_includes_reported_version() {
    let registry = registry(&[("patient", true)]);
    check_everything(&registry).await;
    let router = build_router(registry);

    let (status, body) = get(&router, "/api/v1/services/patient").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["version"], "1.0.0");

    let (status, body) = get(&router, "/api/v1/services/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn register_and_unregister_over_http() {
    let registry = registry(&[]);
    let router = build_router(registry.clone());

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/services")
        .header("content-type", "application/json")
        .body(Body::from(
            r#"{"name":"billing","url":"http://billing:3000","version":"0.9.0"}"#,
        ))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body = json(resp).await;
    assert_eq!(body["data"]["name"], "billing");
    assert_eq!(body["data"]["version"], "0.9.0");

    let (_, body) = get(&router, "/api/v1/services").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri("/api/v1/services/billing")
            .body(Body::empty())
            .unwrap()
    };
    let resp = router.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = router.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(registry.get("billing").is_none());
}

#[tokio::test]
async fn register_rejects_invalid_payloads() {
    let router = build_router(registry(&[]));

    for payload in [
        r#"{"name":"","url":"http://billing:3000"}"#,
        r#"{"name":"billing","url":"billing:3000"}"#,
        r#"{"name":"bad name","url":"http://billing:3000"}"#,
    ] {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/services")
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{payload}");
    }
}

#[tokio::test]
async fn forced_check_reports_unhealthy_service() {
    let registry = registry(&[("billing", false)]);
    let router = build_router(registry);

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/services/billing/check")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["data"]["status"], "unhealthy");
}

#[tokio::test]
async fn gateway_health_reports_scheduler_state() {
    let registry = registry(&[("patient", true)]);
    let router = build_router(registry.clone());

    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["scheduler_running"], false);
    assert_eq!(body["services"], 1);

    registry.start();
    let (_, body) = get(&router, "/health").await;
    assert_eq!(body["scheduler_running"], true);
    registry.destroy();
}
