//! Metrics definitions for the signaling relay
//!
//! All metrics follow Prometheus naming conventions:
//! - `relay_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label value comes from a fixed set in code:
//! - `event`: wire event names (~10 values)
//! - `reason`: drop/rejection reasons (2-4 values)
//! - `outcome`: eviction/reconnect outcomes (2-3 values)
//! - `endpoint`: known routes, everything else is `/other`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Event handling is in-memory; most land well under a millisecond
        .set_buckets_for_metric(
            Matcher::Prefix("relay_event".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ],
        )
        .map_err(|e| format!("Failed to set event latency buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("relay_http".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// State Gauges
// ============================================================================

/// Set the number of live sessions.
///
/// Metric: `relay_sessions_active`
pub fn set_sessions_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_sessions_active").set(count as f64);
}

/// Set the number of non-empty rooms.
///
/// Metric: `relay_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_rooms_active").set(count as f64);
}

/// Set the number of user records across all rooms.
///
/// Metric: `relay_members_active`
pub fn set_members_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_members_active").set(count as f64);
}

/// Set the signaling actor mailbox depth.
///
/// Metric: `relay_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn set_actor_mailbox_depth(actor_type: &str, depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_actor_mailbox_depth", "actor_type" => actor_type.to_string())
        .set(depth as f64);
}

// ============================================================================
// Event Metrics
// ============================================================================

/// Record an inbound client event.
///
/// Metric: `relay_events_total`
/// Labels: `event`
pub fn record_event(event: &str) {
    counter!("relay_events_total", "event" => event.to_string()).increment(1);
}

/// Record how long the actor took to handle one event.
///
/// Metric: `relay_event_latency_seconds`
/// Labels: `event`
pub fn record_event_latency(event: &str, duration: Duration) {
    histogram!("relay_event_latency_seconds", "event" => event.to_string())
        .record(duration.as_secs_f64());
}

/// Record a message that was not delivered.
///
/// Metric: `relay_messages_dropped_total`
/// Labels: `reason` (unresolved_target, notification_failure, malformed, mailbox_closed)
pub fn record_message_dropped(reason: &str) {
    counter!("relay_messages_dropped_total", "reason" => reason.to_string()).increment(1);
}

/// Record a rejected join.
///
/// Metric: `relay_join_rejections_total`
/// Labels: `reason` (duplicate_name)
pub fn record_join_rejection(reason: &str) {
    counter!("relay_join_rejections_total", "reason" => reason.to_string()).increment(1);
}

/// Record a reconnect.
///
/// Metric: `relay_reconnects_total`
/// Labels: `outcome` (resumed, fresh)
pub fn record_reconnect(outcome: &str) {
    counter!("relay_reconnects_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record an eviction timer firing.
///
/// Metric: `relay_evictions_total`
/// Labels: `outcome` (evicted, stale, unknown)
pub fn record_eviction(outcome: &str) {
    counter!("relay_evictions_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record an HTTP request.
///
/// Metrics: `relay_http_requests_total`, `relay_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("relay_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("relay_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        101 | 200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/checkUsername" => "/checkUsername",
        "/ws" => "/ws",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}
