//! Optional health and metrics listener

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::metrics::ServiceMetrics;

#[derive(Clone)]
pub struct StatusState {
    pub metrics: ServiceMetrics,
    pub prometheus: PrometheusHandle,
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// JSON with status, uptime and tool-call counters.
async fn health_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "server": crate::mcp::SERVER_NAME,
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "tool_calls": state.metrics.calls(),
        "tool_failures": state.metrics.failures(),
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus text exposition format.
async fn metrics_handler(State(state): State<StatusState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}
