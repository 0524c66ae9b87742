//! `SignalingActor` - single owner of all signaling state.
//!
//! Every session event, every fired eviction timer and every HTTP query goes
//! through this actor's mailbox, so operations never interleave:
//!
//! - Owns the [`SignalingState`] (registry, directory, connector maps)
//! - Builds one eviction [`Debouncer`] per connection
//! - Fired timers post `EvictionDue` back into the mailbox through a weak
//!   sender, so a timer never keeps the actor alive
//!
//! # Shutdown
//!
//! Cancelling the token stops the loop. Pending eviction timers then find
//! the mailbox gone and do nothing.

use crate::errors::RelayError;
use crate::observability::metrics;
use crate::protocol::ClientEvent;
use crate::scheduler::{DebounceFuture, Debouncer};
use crate::state::{EvictionTicket, SessionHandle, SignalingState};

use super::messages::{RelayState, SignalingMessage};
use super::metrics::MailboxMonitor;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Default channel buffer size for the signaling mailbox.
const SIGNALING_CHANNEL_BUFFER: usize = 4096;

/// Handle to the `SignalingActor`.
///
/// Cloned into every WebSocket session and HTTP handler.
#[derive(Clone, Debug)]
pub struct SignalingActorHandle {
    sender: mpsc::Sender<SignalingMessage>,
    mailbox: Arc<MailboxMonitor>,
    cancel_token: CancellationToken,
}

impl SignalingActorHandle {
    async fn send(&self, message: SignalingMessage) -> Result<(), RelayError> {
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(message).await {
            self.mailbox.record_drop();
            return Err(RelayError::Internal(format!("channel send failed: {e}")));
        }
        Ok(())
    }

    /// Register a session. Resolves once the session can be addressed.
    pub async fn connect(&self, handle: SessionHandle) -> Result<(), RelayError> {
        let (tx, rx) = oneshot::channel();
        self.send(SignalingMessage::Connect {
            handle,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Report a closed session.
    pub async fn disconnect(&self, session_id: impl Into<String>) -> Result<(), RelayError> {
        self.send(SignalingMessage::Disconnect {
            session_id: session_id.into(),
        })
        .await
    }

    /// Queue an inbound event. Events from one caller are handled in the
    /// order they are dispatched.
    pub async fn dispatch(
        &self,
        session_id: impl Into<String>,
        event: ClientEvent,
    ) -> Result<(), RelayError> {
        self.send(SignalingMessage::ClientEvent {
            session_id: session_id.into(),
            event,
        })
        .await
    }

    /// Whether `username` is taken in `room_name`.
    pub async fn check_username(
        &self,
        username: impl Into<String>,
        room_name: impl Into<String>,
    ) -> Result<bool, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.send(SignalingMessage::CheckUsername {
            username: username.into(),
            room_name: room_name.into(),
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Snapshot of rooms and counters.
    pub async fn get_state(&self) -> Result<RelayState, RelayError> {
        let (tx, rx) = oneshot::channel();
        self.send(SignalingMessage::GetState { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| RelayError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Child token for tasks that should stop with the actor.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `SignalingActor` implementation.
pub struct SignalingActor {
    relay_id: String,
    receiver: mpsc::Receiver<SignalingMessage>,
    /// Used only by eviction timers.
    weak_sender: mpsc::WeakSender<SignalingMessage>,
    cancel_token: CancellationToken,
    grace_period: Duration,
    mailbox: Arc<MailboxMonitor>,
    state: SignalingState,
}

impl SignalingActor {
    /// Spawn the actor and return its handle and task.
    ///
    /// # Arguments
    ///
    /// * `relay_id` - Instance id for logs
    /// * `grace_period` - Delay between a disconnect and the committed eviction
    /// * `cancel_token` - Stops the actor when cancelled
    pub fn spawn(
        relay_id: impl Into<String>,
        grace_period: Duration,
        cancel_token: CancellationToken,
    ) -> (SignalingActorHandle, JoinHandle<()>) {
        let relay_id = relay_id.into();
        let (sender, receiver) = mpsc::channel(SIGNALING_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(relay_id.clone()));

        let actor = Self {
            relay_id,
            receiver,
            weak_sender: sender.downgrade(),
            cancel_token: cancel_token.clone(),
            grace_period,
            mailbox: Arc::clone(&mailbox),
            state: SignalingState::new(),
        };
        let task = tokio::spawn(actor.run());

        (
            SignalingActorHandle {
                sender,
                mailbox,
                cancel_token,
            },
            task,
        )
    }

    #[instrument(skip_all, name = "relay.actor.signaling", fields(relay_id = %self.relay_id))]
    async fn run(mut self) {
        info!(
            target: "relay.actor.signaling",
            grace_period_ms = self.grace_period.as_millis() as u64,
            "SignalingActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "relay.actor.signaling",
                        "SignalingActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_dequeue();
                            self.handle_message(message);
                            self.publish_gauges();
                        }
                        None => {
                            info!(
                                target: "relay.actor.signaling",
                                "SignalingActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "relay.actor.signaling",
            sessions_remaining = self.state.session_count(),
            rooms_remaining = self.state.room_count(),
            messages_processed = self.mailbox.messages_processed(),
            "SignalingActor stopped"
        );
    }

    fn handle_message(&mut self, message: SignalingMessage) {
        match message {
            SignalingMessage::Connect { handle, respond_to } => {
                let debouncer = self.eviction_debouncer();
                self.state.connect(handle, debouncer);
                let _ = respond_to.send(());
            }

            SignalingMessage::Disconnect { session_id } => {
                self.state.disconnect(&session_id);
            }

            SignalingMessage::ClientEvent { session_id, event } => {
                let name = event.name();
                let start = Instant::now();
                self.state.handle_event(&session_id, event);
                metrics::record_event_latency(name, start.elapsed());
            }

            SignalingMessage::EvictionDue(ticket) => {
                self.state.evict(&ticket);
            }

            SignalingMessage::CheckUsername {
                username,
                room_name,
                respond_to,
            } => {
                let _ = respond_to.send(self.state.is_name_taken(&room_name, &username));
            }

            SignalingMessage::GetState { respond_to } => {
                let _ = respond_to.send(RelayState {
                    rooms: self.state.snapshot(),
                    session_count: self.state.session_count(),
                    room_count: self.state.room_count(),
                    member_count: self.state.member_count(),
                    mailbox_depth: self.mailbox.current_depth(),
                });
            }
        }
    }

    /// Eviction timer for one connection. When it fires it posts the ticket
    /// back to this actor.
    fn eviction_debouncer(&self) -> Debouncer<EvictionTicket> {
        let mailbox = self.weak_sender.clone();
        let monitor = Arc::clone(&self.mailbox);

        Debouncer::new(self.grace_period, move |ticket: EvictionTicket| {
            let mailbox = mailbox.clone();
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                let Some(sender) = mailbox.upgrade() else {
                    debug!(
                        target: "relay.actor.signaling",
                        identity_id = %ticket.identity_id,
                        "Eviction fired after shutdown, ignoring"
                    );
                    return;
                };
                monitor.record_enqueue();
                if sender
                    .send(SignalingMessage::EvictionDue(ticket))
                    .await
                    .is_err()
                {
                    monitor.record_drop();
                }
            }) as DebounceFuture
        })
    }

    fn publish_gauges(&self) {
        metrics::set_sessions_active(self.state.session_count());
        metrics::set_rooms_active(self.state.room_count());
        metrics::set_members_active(self.state.member_count());
    }
}
