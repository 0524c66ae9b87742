//! Signaling Relay
//!
//! Entry point for the room-based WebRTC signaling relay. Serves the
//! signaling WebSocket, the username query, probes and metrics on a single
//! listener.

use relay_service::actors::SignalingActor;
use relay_service::config::Config;
use relay_service::observability::{init_metrics_recorder, HealthState};
use relay_service::routes::{self, AppState};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting signaling relay");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        relay_id = %config.relay_id,
        bind_address = %config.bind_address,
        disconnect_grace_period_ms = config.disconnect_grace_period.as_millis() as u64,
        session_channel_buffer = config.session_channel_buffer,
        max_message_size = config.max_message_size,
        "Configuration loaded successfully"
    );

    // Install before any metric is recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let health = Arc::new(HealthState::new());
    let shutdown_token = CancellationToken::new();

    let (signaling, actor_task) = SignalingActor::spawn(
        config.relay_id.clone(),
        config.disconnect_grace_period,
        shutdown_token.clone(),
    );

    let bind_address = config.bind_address;
    let state = Arc::new(AppState {
        config,
        signaling,
        health: health.clone(),
    });
    let app = routes::build_routes(state, metrics_handle);

    // Fail fast if the port is taken
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|e| {
            error!("Failed to bind {}: {}", bind_address, e);
            e
        })?;

    health.set_ready();
    info!("Signaling relay listening on {}", bind_address);

    let drain_health = health.clone();
    let drain_token = shutdown_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain_health.set_not_ready();
            // Closes open sockets and stops the actor
            drain_token.cancel();
        })
        .await?;

    shutdown_token.cancel();
    if let Err(e) = actor_task.await {
        warn!("Signaling actor task ended abnormally: {}", e);
    }

    info!("Signaling relay shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
