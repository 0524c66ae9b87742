//! WebSocket session handling.
//!
//! Each upgraded socket gets a UUID session id and a bounded outbound
//! channel. A writer task drains the channel into the socket; the reader
//! loop decodes text frames and dispatches them to the signaling actor in
//! arrival order. When the socket closes the session is reported as
//! disconnected.

use crate::actors::SignalingActorHandle;
use crate::errors::RelayError;
use crate::observability::metrics::record_message_dropped;
use crate::protocol::{decode_client_event, encode_server_event, ServerEvent};
use crate::routes::AppState;
use crate::state::SessionHandle;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// `GET /ws`
pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let max_message_size = state.config.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel(state.config.session_channel_buffer);

    if let Err(e) = state
        .signaling
        .connect(SessionHandle::new(session_id.clone(), tx))
        .await
    {
        warn!(target: "relay.transport.ws", error = %e, "Failed to register session");
        return;
    }
    info!(target: "relay.transport.ws", session_id = %session_id, "WebSocket session opened");

    let (sink, mut stream) = socket.split();
    let writer = spawn_writer(session_id.clone(), sink, rx);
    let shutdown = state.signaling.child_token();

    loop {
        let frame = tokio::select! {
            () = shutdown.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                if let Err(e) = handle_text_frame(&state.signaling, &session_id, &text).await {
                    if matches!(e, RelayError::Internal(_)) {
                        warn!(target: "relay.transport.ws", error = %e, "Signaling actor unavailable");
                        break;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {
                // Binary, ping and pong frames carry no signaling
            }
            Some(Err(e)) => {
                debug!(target: "relay.transport.ws", session_id = %session_id, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    if let Err(e) = state.signaling.disconnect(session_id.clone()).await {
        debug!(target: "relay.transport.ws", error = %e, "Disconnect not delivered");
    }
    writer.abort();

    info!(target: "relay.transport.ws", session_id = %session_id, "WebSocket session closed");
}

/// Decode one text frame and hand it to the actor.
///
/// A frame that does not decode is logged and dropped; only a failure to
/// reach the actor is returned as `Internal`.
pub async fn handle_text_frame(
    signaling: &SignalingActorHandle,
    session_id: &str,
    text: &str,
) -> Result<(), RelayError> {
    let event = match decode_client_event(text) {
        Ok(event) => event,
        Err(e) => {
            let err = RelayError::MalformedMessage(e.to_string());
            warn!(
                target: "relay.transport.ws",
                session_id = %session_id,
                error = %err,
                "Dropping malformed frame"
            );
            record_message_dropped(err.error_type_label());
            return Err(err);
        }
    };

    signaling.dispatch(session_id, event).await
}

fn spawn_writer(
    session_id: String,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match encode_server_event(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(target: "relay.transport.ws", event = event.name(), error = %e, "Failed to encode event");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(target: "relay.transport.ws", session_id = %session_id, error = %e, "WebSocket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    })
}
