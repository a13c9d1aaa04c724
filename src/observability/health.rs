//! Health check HTTP server for container orchestration
//!
//! Runs on its own port so the chat listener keeps exactly one route.

use crate::error::{CrewError, CrewResult};
use crate::observability::metrics::metrics;
use crate::server::ChatState;
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Request activity older than this marks the service as idle
const REQUEST_IDLE_THRESHOLD_SECONDS: u64 = 3600;

/// HTTP health check server
pub struct HealthServer {
    service: String,
    addr: SocketAddr,
    state: Arc<ChatState>,
}

impl HealthServer {
    /// Create new health server
    pub fn new(service: impl Into<String>, addr: SocketAddr, state: Arc<ChatState>) -> Self {
        Self {
            service: service.into(),
            addr,
            state,
        }
    }

    /// Health, readiness, liveness and metrics routes
    pub fn routes(
        self: Arc<Self>,
    ) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let health_server = self.clone();
        let ready_server = self;

        // GET /health - comprehensive health status
        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let server = health_server.clone();
                async move {
                    let status = server.get_health_status().await;
                    let code = if status.status == "healthy" {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    Ok::<_, Infallible>(warp::reply::with_status(
                        warp::reply::json(&status),
                        code,
                    ))
                }
            });

        // GET /metrics - metrics snapshot
        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&metrics().get_metrics()));

        // GET /ready - model service reachable
        let ready_route = warp::path("ready")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let server = ready_server.clone();
                async move {
                    let ready = server.check_llm_health().await.status == "healthy";
                    let response = ReadinessResponse {
                        ready,
                        timestamp: current_timestamp(),
                    };
                    let code = if ready {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    Ok::<_, Infallible>(warp::reply::with_status(
                        warp::reply::json(&response),
                        code,
                    ))
                }
            });

        // GET /live - process is up
        let live_route = warp::path("live")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                warp::reply::json(&LivenessResponse {
                    alive: true,
                    timestamp: current_timestamp(),
                })
            });

        health_route
            .or(metrics_route)
            .or(ready_route)
            .or(live_route)
            .with(warp::cors().allow_any_origin())
    }

    /// Bind the health listener and serve until the process exits
    ///
    /// Bind failures are returned to the caller.
    pub async fn start(self: Arc<Self>) -> CrewResult<()> {
        let addr = self.addr;
        let (bound, server) = warp::serve(self.routes())
            .try_bind_ephemeral(addr)
            .map_err(|e| CrewError::internal(format!("failed to bind health server {addr}: {e}")))?;

        tracing::info!("Health server listening on http://{}", bound);
        server.await;
        Ok(())
    }

    async fn get_health_status(&self) -> HealthStatus {
        let mut checks = HashMap::new();
        checks.insert("llm".to_string(), self.check_llm_health().await);
        checks.insert("pipeline".to_string(), self.check_pipeline());
        checks.insert("request_activity".to_string(), self.check_request_activity());

        // Idle is informational; only failed checks degrade the service
        let overall_healthy = checks.values().all(|check| check.status != "unhealthy");

        HealthStatus {
            status: if overall_healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: current_timestamp(),
            service: self.service.clone(),
            uptime_seconds: metrics().get_metrics().uptime_seconds,
            checks,
        }
    }

    async fn check_llm_health(&self) -> HealthCheck {
        let llm = self.state.llm();
        match llm.provider().health_check().await {
            Ok(()) => HealthCheck::new(
                "healthy",
                format!("{} reachable, model {}", llm.provider().name(), llm.model()),
            ),
            Err(e) => HealthCheck::new("unhealthy", format!("Model service unreachable: {e}")),
        }
    }

    fn check_pipeline(&self) -> HealthCheck {
        if self.state.is_initialized() {
            HealthCheck::new("healthy", "Agent pipeline constructed")
        } else {
            HealthCheck::new("healthy", "Agent pipeline builds on first request")
        }
    }

    fn check_request_activity(&self) -> HealthCheck {
        match metrics().seconds_since_last_request() {
            None => HealthCheck::new("healthy", "No requests yet"),
            Some(idle) if idle > REQUEST_IDLE_THRESHOLD_SECONDS => {
                HealthCheck::new("idle", format!("No requests for {idle} seconds"))
            }
            Some(_) => HealthCheck::new("healthy", "Recent request activity"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: Option<String>,
    pub last_check: u64,
}

impl HealthCheck {
    fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: Some(message.into()),
            last_check: current_timestamp(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: String,
    timestamp: u64,
    service: String,
    uptime_seconds: u64,
    checks: HashMap<String, HealthCheck>,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
