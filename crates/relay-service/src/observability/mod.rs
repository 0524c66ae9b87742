//! Observability for the signaling relay.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit fields.
//! Display names and SDP payloads are never logged above `debug`.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `relay_sessions_active` | Gauge | none | Live WebSocket sessions |
//! | `relay_rooms_active` | Gauge | none | Non-empty rooms |
//! | `relay_members_active` | Gauge | none | User records across rooms |
//! | `relay_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `relay_events_total` | Counter | `event` | Inbound client events |
//! | `relay_event_latency_seconds` | Histogram | `event` | Actor handling time |
//! | `relay_messages_dropped_total` | Counter | `reason` | Undelivered messages |
//! | `relay_join_rejections_total` | Counter | `reason` | Rejected joins |
//! | `relay_reconnects_total` | Counter | `outcome` | Reconnects by outcome |
//! | `relay_evictions_total` | Counter | `outcome` | Fired eviction timers |
//! | `relay_http_requests_total` | Counter | `method`, `endpoint`, `status_code` | HTTP requests |
//! | `relay_http_request_duration_seconds` | Histogram | `method`, `endpoint`, `status` | HTTP latency |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
