//! Health check probe logic.
//!
//! Probes a service's health endpoint with a per-attempt timeout and
//! retries failed attempts with exponential backoff. The terminal result
//! of every check is written to the [`RegistryStore`]; nothing is ever
//! returned to the caller as an error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::store::{CheckOutcome, RegistryStore};
use crate::types::{HealthReport, HealthStatus, ServiceRecord};

/// Boxed future returned by [`Probe`] implementations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    /// The health endpoint returned 200.
    Healthy(HealthReport),
    /// The health endpoint returned any other status.
    Unhealthy { status: u16 },
    /// The probe could not be executed (connection or protocol error).
    Failed { error: String },
}

/// Issues one GET against a health endpoint.
///
/// Implementations do not need to enforce a timeout; the checker wraps
/// every attempt in one.
pub trait Probe: Send + Sync {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult>;
}

/// HTTP/1 probe over a fresh TCP connection per attempt.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl Probe for HttpProbe {
    fn probe<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ProbeResult> {
        Box::pin(http_probe(url))
    }
}

/// Perform an HTTP GET against `url`.
///
/// Returns `Healthy` with the parsed body for a 200, `Unhealthy` for any
/// other status, or `Failed` if the request cannot be completed.
pub async fn http_probe(url: &str) -> ProbeResult {
    let failed = |error: String| ProbeResult::Failed { error };

    let uri: http::Uri = match url.parse() {
        Ok(uri) => uri,
        Err(e) => return failed(format!("invalid url: {e}")),
    };
    if uri.scheme_str() != Some("http") {
        return failed(format!("unsupported url {url}"));
    }
    let Some(authority) = uri.authority().cloned() else {
        return failed(format!("missing host in {url}"));
    };
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));

    let stream = match tokio::net::TcpStream::connect(&address).await {
        Ok(s) => s,
        Err(e) => {
            debug!(error = %e, %url, "health probe connection failed");
            return failed(format!("connect {address}: {e}"));
        }
    };

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
        Ok(pair) => pair,
        Err(e) => {
            debug!(error = %e, %url, "health probe handshake failed");
            return failed(format!("handshake: {e}"));
        }
    };

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    let req = match http::Request::builder()
        .method(http::Method::GET)
        .uri(path)
        .header(http::header::HOST, authority.as_str())
        .header(http::header::USER_AGENT, "caregate-registry/0.1")
        .header(http::header::ACCEPT, "application/json")
        .body(http_body_util::Empty::<bytes::Bytes>::new())
    {
        Ok(req) => req,
        Err(e) => return failed(format!("build request: {e}")),
    };

    let resp = match sender.send_request(req).await {
        Ok(resp) => resp,
        Err(e) => {
            debug!(error = %e, %url, "health probe request failed");
            return failed(format!("request: {e}"));
        }
    };

    let status = resp.status();
    if status != http::StatusCode::OK {
        debug!(%status, %url, "health probe non-200");
        return ProbeResult::Unhealthy {
            status: status.as_u16(),
        };
    }

    match resp.into_body().collect().await {
        Ok(body) => ProbeResult::Healthy(HealthReport::from_body(&body.to_bytes())),
        Err(e) => failed(format!("read body: {e}")),
    }
}

/// Delay after failed attempt `attempt` (1-based): 1s, 2s, 4s, ...
pub fn backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    Duration::from_secs(1u64 << exp)
}

/// Runs checks for individual services and records their outcome.
pub struct HealthChecker {
    store: RegistryStore,
    probe: Arc<dyn Probe>,
    health_path: String,
    timeout: Duration,
    max_retries: u32,
}

impl HealthChecker {
    pub fn new(
        store: RegistryStore,
        probe: Arc<dyn Probe>,
        health_path: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            probe,
            health_path: health_path.into(),
            timeout,
            max_retries: max_retries.max(1),
        }
    }

    /// Check one service and persist the result.
    ///
    /// Returns the updated record, or `None` if the service is not
    /// registered (or was unregistered while the check was running).
    pub async fn check(&self, name: &str) -> Option<ServiceRecord> {
        let Some(record) = self.store.get(name) else {
            warn!(service = %name, "health check requested for unregistered service");
            return None;
        };
        let url = format!("{}{}", record.url.trim_end_matches('/'), self.health_path);

        let mut last_error = String::new();
        let mut elapsed = Duration::ZERO;

        for attempt in 1..=self.max_retries {
            let started = Instant::now();
            let result = tokio::time::timeout(self.timeout, self.probe.probe(&url)).await;
            elapsed = started.elapsed();

            match result {
                Ok(ProbeResult::Healthy(report)) => {
                    if record.status != HealthStatus::Healthy {
                        info!(service = %name, attempt, "service is healthy");
                    }
                    debug!(
                        service = %name,
                        response_time_ms = elapsed.as_millis() as u64,
                        "health check passed"
                    );
                    return self.store.apply_outcome(
                        name,
                        CheckOutcome::Healthy {
                            response_time: elapsed,
                            report,
                        },
                    );
                }
                Ok(ProbeResult::Unhealthy { status }) => {
                    last_error = format!("health endpoint returned {status}");
                }
                Ok(ProbeResult::Failed { error }) => last_error = error,
                Err(_) => {
                    last_error = format!("timed out after {}ms", self.timeout.as_millis());
                }
            }

            if attempt < self.max_retries {
                let delay = backoff(attempt);
                warn!(
                    service = %name,
                    attempt,
                    max_retries = self.max_retries,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "health check attempt failed"
                );
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            service = %name,
            retries = self.max_retries,
            error = %last_error,
            "health check failed, marking unhealthy"
        );
        self.store.apply_outcome(
            name,
            CheckOutcome::Unhealthy {
                response_time: elapsed,
            },
        )
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }
}
