//! In-process sessions attached to a running signaling actor.
//!
//! A `TestSession` stands in for one WebSocket: it registers a
//! `SessionHandle` with the actor and keeps the receiving end of the
//! outbound channel so tests can inspect exactly what the relay sent.

use relay_service::actors::{RelayState, SignalingActor, SignalingActorHandle};
use relay_service::protocol::{
    ClientEvent, ConnectedNotice, ErrorNotice, GetOfferNotice, LeaveNotice, ReconnectNotice,
    ServerEvent,
};
use relay_service::state::SessionHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outbound buffer for test sessions.
pub const TEST_SESSION_BUFFER: usize = 64;

/// Spawn a signaling actor with its own cancellation token.
pub fn spawn_relay(grace_period: Duration) -> (SignalingActorHandle, JoinHandle<()>) {
    SignalingActor::spawn("relay-test", grace_period, CancellationToken::new())
}

/// Wait until the actor has handled everything queued so far.
///
/// The actor processes its mailbox in order, so a state query returns only
/// after every earlier dispatch has been applied.
pub async fn settle(signaling: &SignalingActorHandle) -> RelayState {
    signaling
        .get_state()
        .await
        .expect("signaling actor should answer get_state")
}

/// Move paused time forward and let fired timers reach the actor.
///
/// Requires a paused clock (`#[tokio::test(start_paused = true)]`).
pub async fn elapse(signaling: &SignalingActorHandle, duration: Duration) -> RelayState {
    tokio::time::advance(duration).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    settle(signaling).await
}

/// One simulated client connection.
pub struct TestSession {
    session_id: String,
    signaling: SignalingActorHandle,
    receiver: mpsc::Receiver<ServerEvent>,
}

impl TestSession {
    /// Connect with a random session id.
    pub async fn connect(signaling: &SignalingActorHandle) -> Self {
        Self::connect_as(signaling, uuid::Uuid::new_v4().to_string()).await
    }

    /// Connect with a chosen session id and consume the `connect` frame.
    pub async fn connect_as(signaling: &SignalingActorHandle, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let (tx, receiver) = mpsc::channel(TEST_SESSION_BUFFER);
        signaling
            .connect(SessionHandle::new(session_id.clone(), tx))
            .await
            .expect("signaling actor should accept connect");

        let mut session = Self {
            session_id,
            signaling: signaling.clone(),
            receiver,
        };
        let expected = ServerEvent::Connected(ConnectedNotice {
            session_id: session.session_id.clone(),
        });
        assert_eq!(session.expect_event(), expected, "first frame must be connect");
        session
    }

    /// Server-assigned session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Dispatch a client event from this session.
    pub async fn send(&self, event: ClientEvent) {
        self.signaling
            .dispatch(self.session_id.clone(), event)
            .await
            .expect("signaling actor should accept dispatch");
    }

    /// Report this session's transport as closed.
    pub async fn close(self) {
        self.signaling
            .disconnect(self.session_id.clone())
            .await
            .expect("signaling actor should accept disconnect");
    }

    /// Next queued event, if any.
    pub fn next_event(&mut self) -> Option<ServerEvent> {
        self.receiver.try_recv().ok()
    }

    /// All queued events.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event() {
            events.push(event);
        }
        events
    }

    /// Next queued event; panics if nothing was sent.
    pub fn expect_event(&mut self) -> ServerEvent {
        match self.next_event() {
            Some(event) => event,
            None => panic!("session {} expected an event, got none", self.session_id),
        }
    }

    /// Assert nothing is queued.
    pub fn expect_silent(&mut self) {
        let events = self.drain();
        assert!(
            events.is_empty(),
            "session {} expected no events, got {events:?}",
            self.session_id
        );
    }

    /// Assert the next event is `getOffer` naming `member_id`.
    pub fn expect_get_offer(&mut self, member_id: &str) {
        assert_eq!(
            self.expect_event(),
            ServerEvent::GetOffer(GetOfferNotice {
                member_id: member_id.to_string()
            })
        );
    }

    /// Assert the next event is `leave` for `connector_id` from `member_id`.
    pub fn expect_leave(&mut self, connector_id: &str, member_id: &str) {
        assert_eq!(
            self.expect_event(),
            ServerEvent::Leave(LeaveNotice {
                connector_id: connector_id.to_string(),
                member_id: member_id.to_string(),
            })
        );
    }

    /// Assert the next event is a `reconnect` notice equal to `notice`.
    pub fn expect_reconnect(&mut self, notice: ReconnectNotice) {
        assert_eq!(self.expect_event(), ServerEvent::Reconnect(notice));
    }

    /// Assert the next event is the duplicate-name error.
    pub fn expect_repeat_error(&mut self) {
        assert_eq!(self.expect_event(), ServerEvent::Error(ErrorNotice::repeat()));
    }
}
