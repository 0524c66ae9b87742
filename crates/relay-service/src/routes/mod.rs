//! HTTP routes for the signaling relay.
//!
//! Defines the Axum router and application state.

use crate::actors::SignalingActorHandle;
use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::observability::{health_router, HealthState};
use crate::transport::websocket_handler;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Handle to the signaling actor.
    pub signaling: SignalingActorHandle,

    /// Liveness and readiness flags.
    pub health: Arc<HealthState>,
}

/// Build the application routes.
///
/// - `/checkUsername` - Username availability in a room
/// - `/ws` - Signaling WebSocket
/// - `/health`, `/ready` - Probes
/// - `/metrics` - Prometheus scrape endpoint
///
/// Every route allows any origin.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let signaling_routes = Router::new()
        .route("/checkUsername", get(handlers::check_username))
        .route("/ws", get(websocket_handler))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. CorsLayer
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost)
    signaling_routes
        .merge(metrics_routes)
        .merge(health_router(state.health.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
