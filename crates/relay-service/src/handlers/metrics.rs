//! Prometheus scrape endpoint.
//!
//! Unauthenticated. Labels are bounded enums, and no identity ids, names or
//! room names appear in metrics.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for `GET /metrics`.
#[tracing::instrument(skip_all, name = "relay.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
