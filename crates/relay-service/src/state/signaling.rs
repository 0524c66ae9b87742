//! Join, relay, reconnect, leave and eviction against the registry and
//! directory.
//!
//! Every operation is synchronous and runs to completion. Outbound events
//! are queued on session channels without waiting; a target that does not
//! resolve, or whose channel is full, loses the event and the operation
//! carries on.

use crate::errors::RelayError;
use crate::observability::metrics;
use crate::protocol::{
    AnswerNotice, AnswerRequest, CandidateNotice, CandidateRequest, ClientEvent,
    ConnectedNotice, ErrorNotice, GetOfferNotice, IdentityId, JoinRequest, LeaveNotice,
    LeaveTarget, OfferNotice, OfferRequest, ReconnectNotice, ReconnectRequest, ReconnectWork,
    ServerEvent, SessionId,
};
use crate::scheduler::Debouncer;
use crate::state::connectors::StreamType;
use crate::state::directory::{MemberInfo, RoomDirectory, UserRecord};
use crate::state::reconcile::reconcile;
use crate::state::registry::{ConnectionRegistry, EvictionTicket, SessionHandle};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Result of handling a fired eviction timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionOutcome {
    /// Record removed; `notified` peers were sent `leave`, `failed` could not be.
    Evicted { notified: usize, failed: usize },
    /// The identity has since reconnected on another session.
    Stale,
    /// The identity already left.
    Unknown,
}

impl EvictionOutcome {
    /// Metric label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            EvictionOutcome::Evicted { .. } => "evicted",
            EvictionOutcome::Stale => "stale",
            EvictionOutcome::Unknown => "unknown",
        }
    }
}

/// Registry plus directory.
#[derive(Debug, Default)]
pub struct SignalingState {
    registry: ConnectionRegistry,
    directory: RoomDirectory,
}

impl SignalingState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether `display_name` is in use in `room_name`.
    #[must_use]
    pub fn is_name_taken(&self, room_name: &str, display_name: &str) -> bool {
        self.directory.is_name_taken(room_name, display_name)
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<MemberInfo>> {
        self.directory.snapshot()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.directory.room_count()
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.directory.member_count()
    }

    #[must_use]
    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Register a new session and tell it its id.
    #[instrument(skip_all, fields(session_id = %handle.session_id()))]
    pub fn connect(&mut self, handle: SessionHandle, eviction: Debouncer<EvictionTicket>) {
        let session_id = handle.session_id().to_string();
        self.registry.register(handle, eviction);

        self.send_or_log(
            &session_id,
            ServerEvent::Connected(ConnectedNotice {
                session_id: session_id.clone(),
            }),
        );

        debug!(target: "relay.actor.signaling", "Session connected");
    }

    /// Remove a session. A session that still holds its identity's record
    /// arms that identity's eviction.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub fn disconnect(&mut self, session_id: &str) {
        let Some(client) = self.registry.lookup_mut(session_id) else {
            debug!(target: "relay.actor.signaling", "Disconnect for unknown session");
            return;
        };

        if let Some(identity_id) = client.user_id.clone() {
            let owns_record = self
                .directory
                .get(&identity_id)
                .is_some_and(|record| record.session_id == session_id);
            if !owns_record {
                // Superseded by a reconnect elsewhere; nothing to evict.
                client.user_id = None;
            }
        }

        let armed = self
            .registry
            .remove(session_id)
            .is_some_and(|client| client.user_id.is_some());

        info!(
            target: "relay.actor.signaling",
            eviction_armed = armed,
            "Session disconnected"
        );
        self.log_snapshot();
    }

    /// Dispatch one inbound client event.
    pub fn handle_event(&mut self, session_id: &str, event: ClientEvent) {
        if self.registry.lookup(session_id).is_none() {
            warn!(
                target: "relay.actor.signaling",
                session_id = %session_id,
                event = event.name(),
                "Event from unregistered session dropped"
            );
            return;
        }

        metrics::record_event(event.name());

        match event {
            ClientEvent::Join(request) => self.join(session_id, request),
            ClientEvent::Offer(request) => self.relay_offer(session_id, request),
            ClientEvent::Answer(request) => self.relay_answer(session_id, request),
            ClientEvent::IceCandidate(request) => self.relay_candidate(session_id, request),
            ClientEvent::Reconnect(request) => self.reconnect(session_id, request),
            ClientEvent::ReconnectWork(work) => self.relay_reconnect_work(session_id, work),
            ClientEvent::Leave(targets) => self.leave(session_id, targets),
        }
    }

    // ------------------------------------------------------------------
    // Join
    // ------------------------------------------------------------------

    /// Join a room. A duplicate display name is reported to the caller and
    /// changes nothing.
    #[instrument(skip_all, fields(session_id = %session_id, identity_id = %request.id, room = %request.roomname))]
    pub fn join(&mut self, session_id: &str, request: JoinRequest) {
        let JoinRequest {
            id: identity_id,
            username,
            roomname: room_name,
        } = request;

        if self.directory.is_name_taken(&room_name, &username) {
            let err = RelayError::DuplicateName {
                username,
                room: room_name,
            };
            debug!(target: "relay.actor.signaling", error = %err, "Join rejected");
            metrics::record_join_rejection("duplicate_name");
            self.send_or_log(session_id, ServerEvent::Error(ErrorNotice::repeat()));
            return;
        }

        let Some(client) = self.registry.lookup_mut(session_id) else {
            return;
        };
        let previous_identity = client.user_id.replace(identity_id.clone());
        let eviction = client.eviction.cancel_handle();

        // Joining as a new identity drops the one this session held.
        self.release_previous_identity(session_id, previous_identity, &identity_id);

        // Existing members are told before the new record goes in.
        let peers = self.peer_sessions(&room_name, &identity_id);
        for peer in &peers {
            self.send_or_log(
                peer,
                ServerEvent::GetOffer(GetOfferNotice {
                    member_id: session_id.to_string(),
                }),
            );
        }

        let record = UserRecord::new(
            identity_id,
            username,
            room_name.clone(),
            session_id,
            eviction,
        );
        if let Some(previous) = self.directory.insert(record) {
            previous.eviction.cancel();
            if previous.room_name != room_name {
                debug!(
                    target: "relay.actor.signaling",
                    previous_room = %previous.room_name,
                    "Identity moved rooms"
                );
            }
        }

        info!(
            target: "relay.actor.signaling",
            peers_notified = peers.len(),
            "Joined room"
        );
        self.log_snapshot();
    }

    // ------------------------------------------------------------------
    // Relay
    // ------------------------------------------------------------------

    /// Forward an offer and record the sender under the target's connectors.
    pub fn relay_offer(&mut self, sender: &str, request: OfferRequest) {
        let OfferRequest {
            connector_id,
            offer,
            member_id: target,
            stream_type,
        } = request;

        if !self.resolve_target(&target, "offer") {
            return;
        }
        self.record_connector(&target, stream_type, &connector_id, sender);

        self.send_or_log(
            &target,
            ServerEvent::Offer(OfferNotice {
                remote_connector_id: connector_id,
                offer,
                member_id: sender.to_string(),
                stream_type,
            }),
        );
    }

    /// Forward an answer and record the sender under the target's connectors.
    pub fn relay_answer(&mut self, sender: &str, request: AnswerRequest) {
        let AnswerRequest {
            remote_connector_id,
            connector_id,
            answer,
            member_id: target,
            stream_type,
        } = request;

        if !self.resolve_target(&target, "answer") {
            return;
        }
        self.record_connector(&target, stream_type, &connector_id, sender);

        self.send_or_log(
            &target,
            ServerEvent::Answer(AnswerNotice {
                remote_connector_id: connector_id,
                connector_id: remote_connector_id,
                answer,
                member_id: sender.to_string(),
            }),
        );
    }

    /// Forward a candidate. No bookkeeping.
    pub fn relay_candidate(&mut self, _sender: &str, request: CandidateRequest) {
        if !self.resolve_target(&request.member_id, "icecandidate") {
            return;
        }
        self.send_or_log(
            &request.member_id,
            ServerEvent::IceCandidate(CandidateNotice {
                connector_id: request.remote_connector_id,
                candidate: request.candidate,
            }),
        );
    }

    /// Forward renegotiation traffic as a `reconnect` event, unchanged.
    pub fn relay_reconnect_work(&mut self, _sender: &str, work: ReconnectWork) {
        let target = work.member_id.clone();
        if !self.resolve_target(&target, "reconnectWork") {
            return;
        }
        self.send_or_log(&target, ServerEvent::Reconnect(work.into()));
    }

    // ------------------------------------------------------------------
    // Reconnect
    // ------------------------------------------------------------------

    /// Resume an identity on a new session, or fall through to a fresh join
    /// if the identity is unknown.
    #[instrument(skip_all, fields(session_id = %session_id, identity_id = %request.id))]
    pub fn reconnect(&mut self, session_id: &str, request: ReconnectRequest) {
        let ReconnectRequest {
            id: identity_id,
            roomname,
            username,
        } = request;

        let Some(record) = self.directory.get(&identity_id) else {
            info!(target: "relay.actor.signaling", "Reconnect for unknown identity, joining fresh");
            metrics::record_reconnect("fresh");
            self.send_or_log(
                session_id,
                ServerEvent::Reconnect(ReconnectNotice::fresh_leave()),
            );
            let username = username.unwrap_or_else(|| identity_id.clone());
            self.join(
                session_id,
                JoinRequest {
                    id: identity_id,
                    username,
                    roomname,
                },
            );
            return;
        };

        let room_name = record.room_name.clone();
        if room_name != roomname {
            warn!(
                target: "relay.actor.signaling",
                room = %room_name,
                requested_room = %roomname,
                "Reconnect names a different room; using the recorded one"
            );
        }

        let prior = record.connectors.entries();

        let Some(client) = self.registry.lookup_mut(session_id) else {
            return;
        };
        let new_eviction = client.eviction.cancel_handle();
        let previous_identity = client.user_id.replace(identity_id.clone());

        // Resuming another identity drops the one this session held.
        self.release_previous_identity(session_id, previous_identity, &identity_id);

        let peers: Vec<SessionId> = self
            .peer_sessions(&room_name, &identity_id)
            .into_iter()
            .filter(|peer| self.registry.lookup(peer).is_some())
            .collect();
        let plan = reconcile(&peers, &prior);

        if let Some(record) = self.directory.get_mut(&identity_id) {
            record.eviction.cancel();
            record.eviction = new_eviction;
            for entry in &plan.departed {
                record
                    .connectors
                    .remove(entry.stream_type, &entry.connector_id);
            }
            record.session_id = session_id.to_string();
        }

        for peer in &plan.fresh_offers {
            self.send_or_log(
                peer,
                ServerEvent::GetOffer(GetOfferNotice {
                    member_id: session_id.to_string(),
                }),
            );
        }
        for entry in &plan.renegotiate {
            self.send_or_log(
                &entry.peer_session,
                ServerEvent::Reconnect(ReconnectNotice::renegotiate(entry.connector_id.clone())),
            );
        }
        for entry in &plan.departed {
            self.send_or_log(
                session_id,
                ServerEvent::Reconnect(ReconnectNotice::peer_left(entry.peer_session.clone())),
            );
        }

        metrics::record_reconnect("resumed");
        info!(
            target: "relay.actor.signaling",
            fresh_offers = plan.fresh_offers.len(),
            renegotiated = plan.renegotiate.len(),
            departed = plan.departed.len(),
            "Reconnected"
        );
    }

    // ------------------------------------------------------------------
    // Leave & eviction
    // ------------------------------------------------------------------

    /// Explicit leave from the session holding the identity's record.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub fn leave(&mut self, session_id: &str, targets: Vec<LeaveTarget>) {
        let Some(client) = self.registry.lookup_mut(session_id) else {
            return;
        };
        let Some(identity_id) = client.user_id.take() else {
            debug!(target: "relay.actor.signaling", "Leave from unbound session ignored");
            return;
        };

        let owns_record = self
            .directory
            .get(&identity_id)
            .is_some_and(|record| record.session_id == session_id);
        if !owns_record {
            debug!(
                target: "relay.actor.signaling",
                identity_id = %identity_id,
                "Leave from superseded session ignored"
            );
            return;
        }

        if let Some(record) = self.directory.remove(&identity_id) {
            record.eviction.cancel();
        }

        for target in targets {
            self.send_or_log(
                &target.member_id,
                ServerEvent::Leave(LeaveNotice {
                    connector_id: target.remote_connector_id,
                    member_id: session_id.to_string(),
                }),
            );
        }

        info!(target: "relay.actor.signaling", identity_id = %identity_id, "Left room");
        self.log_snapshot();
    }

    /// Commit an eviction whose grace window expired.
    ///
    /// Discarded if the identity is gone or now belongs to another session.
    /// Peer notifications are best-effort.
    #[instrument(skip_all, fields(identity_id = %ticket.identity_id, session_id = %ticket.session_id))]
    pub fn evict(&mut self, ticket: &EvictionTicket) -> EvictionOutcome {
        let outcome = self.evict_inner(ticket);
        metrics::record_eviction(outcome.label());

        match outcome {
            EvictionOutcome::Evicted { notified, failed } => {
                info!(
                    target: "relay.actor.signaling",
                    notified,
                    failed,
                    "Grace window expired, user evicted"
                );
                self.log_snapshot();
            }
            EvictionOutcome::Stale | EvictionOutcome::Unknown => {
                debug!(
                    target: "relay.actor.signaling",
                    outcome = outcome.label(),
                    "Eviction discarded"
                );
            }
        }

        outcome
    }

    fn evict_inner(&mut self, ticket: &EvictionTicket) -> EvictionOutcome {
        match self.directory.get(&ticket.identity_id) {
            None => return EvictionOutcome::Unknown,
            Some(record) if record.session_id != ticket.session_id => {
                return EvictionOutcome::Stale
            }
            Some(_) => {}
        }

        let Some(record) = self.directory.remove(&ticket.identity_id) else {
            return EvictionOutcome::Unknown;
        };

        let mut notified = 0;
        let mut failed = 0;
        for entry in record.connectors.entries() {
            let event = ServerEvent::Leave(LeaveNotice {
                connector_id: entry.connector_id,
                member_id: record.session_id.clone(),
            });
            match self.send(&entry.peer_session, event) {
                Ok(()) => notified += 1,
                Err(RelayError::UnresolvedTarget(_)) => {
                    debug!(
                        target: "relay.actor.signaling",
                        peer = %entry.peer_session,
                        "Connector peer gone, skipping leave notice"
                    );
                }
                Err(e) => {
                    warn!(target: "relay.actor.signaling", error = %e, "Leave notice failed");
                    metrics::record_message_dropped(e.error_type_label());
                    failed += 1;
                }
            }
        }

        EvictionOutcome::Evicted { notified, failed }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Remove the record a session held under `previous`, if it still holds
    /// it and is now acting as `current`.
    fn release_previous_identity(
        &mut self,
        session_id: &str,
        previous: Option<IdentityId>,
        current: &IdentityId,
    ) {
        let Some(previous) = previous.filter(|prev| prev != current) else {
            return;
        };
        let held = self
            .directory
            .get(&previous)
            .is_some_and(|record| record.session_id == session_id);
        if held {
            self.directory.remove(&previous);
            debug!(
                target: "relay.actor.signaling",
                previous_identity = %previous,
                "Session switched identity"
            );
        }
    }

    /// Sessions of every other member of a room, in identity order.
    fn peer_sessions(&self, room_name: &str, identity_id: &IdentityId) -> Vec<SessionId> {
        self.directory
            .members(room_name)
            .iter()
            .filter(|member| *member != identity_id)
            .filter_map(|member| self.directory.get(member))
            .map(|record| record.session_id.clone())
            .collect()
    }

    /// Record `peer` under the target's connector map, if the target holds
    /// an identity.
    fn record_connector(
        &mut self,
        target: &str,
        stream_type: StreamType,
        connector_id: &str,
        peer: &str,
    ) {
        let Some(identity_id) = self
            .registry
            .lookup(target)
            .and_then(|client| client.user_id.clone())
        else {
            return;
        };

        if let Some(record) = self.directory.get_mut(&identity_id) {
            if record.session_id == target {
                record.connectors.record(stream_type, connector_id, peer);
            }
        }
    }

    fn resolve_target(&self, target: &str, event: &'static str) -> bool {
        if self.registry.lookup(target).is_some() {
            return true;
        }
        let err = RelayError::UnresolvedTarget(target.to_string());
        debug!(target: "relay.actor.signaling", event, error = %err, "Relay target not found, dropping");
        metrics::record_message_dropped(err.error_type_label());
        false
    }

    fn send(&self, session_id: &str, event: ServerEvent) -> Result<(), RelayError> {
        let client = self
            .registry
            .lookup(session_id)
            .ok_or_else(|| RelayError::UnresolvedTarget(session_id.to_string()))?;
        client.handle.deliver(event)
    }

    fn send_or_log(&self, session_id: &str, event: ServerEvent) {
        let name = event.name();
        if let Err(e) = self.send(session_id, event) {
            match e {
                RelayError::UnresolvedTarget(_) => {
                    debug!(target: "relay.actor.signaling", event = name, error = %e, "Event dropped");
                }
                _ => {
                    warn!(target: "relay.actor.signaling", event = name, error = %e, "Event dropped");
                }
            }
            metrics::record_message_dropped(e.error_type_label());
        }
    }

    fn log_snapshot(&self) {
        debug!(
            target: "relay.actor.signaling",
            rooms = ?self.directory.snapshot(),
            "Room snapshot"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::scheduler::DebounceFuture;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        state: SignalingState,
        tickets_tx: mpsc::UnboundedSender<EvictionTicket>,
        tickets: mpsc::UnboundedReceiver<EvictionTicket>,
    }

    impl Harness {
        fn new() -> Self {
            let (tickets_tx, tickets) = mpsc::unbounded_channel();
            Self {
                state: SignalingState::new(),
                tickets_tx,
                tickets,
            }
        }

        fn connect(&mut self, session_id: &str) -> mpsc::Receiver<ServerEvent> {
            let (tx, mut rx) = mpsc::channel(32);
            let tickets = self.tickets_tx.clone();
            let debouncer = Debouncer::new(Duration::from_secs(15), move |ticket| {
                let tickets = tickets.clone();
                Box::pin(async move {
                    let _ = tickets.send(ticket);
                }) as DebounceFuture
            });
            self.state
                .connect(SessionHandle::new(session_id, tx), debouncer);
            assert!(matches!(rx.try_recv(), Ok(ServerEvent::Connected(_))));
            rx
        }

        fn join(&mut self, session_id: &str, id: &str, name: &str, room: &str) {
            self.state.handle_event(
                session_id,
                ClientEvent::Join(JoinRequest {
                    id: id.to_string(),
                    username: name.to_string(),
                    roomname: room.to_string(),
                }),
            );
        }

        fn offer(&mut self, from: &str, to: &str, connector: &str, stream_type: StreamType) {
            self.state.handle_event(
                from,
                ClientEvent::Offer(OfferRequest {
                    connector_id: connector.to_string(),
                    offer: json!({"sdp": "offer"}),
                    member_id: to.to_string(),
                    stream_type,
                }),
            );
        }

        fn reconnect(&mut self, session_id: &str, id: &str, room: &str) {
            self.state.handle_event(
                session_id,
                ClientEvent::Reconnect(ReconnectRequest {
                    id: id.to_string(),
                    roomname: room.to_string(),
                    username: None,
                }),
            );
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn get_offer(member: &str) -> ServerEvent {
        ServerEvent::GetOffer(GetOfferNotice {
            member_id: member.to_string(),
        })
    }

    #[tokio::test]
    async fn test_connect_sends_session_id() {
        let mut state = SignalingState::new();
        let (tx, mut rx) = mpsc::channel(4);
        let debouncer = Debouncer::new(Duration::from_secs(1), |_ticket: EvictionTicket| {
            Box::pin(async {}) as DebounceFuture
        });

        state.connect(SessionHandle::new("s1", tx), debouncer);

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::Connected(ConnectedNotice {
                session_id: "s1".to_string()
            })
        );
        assert_eq!(state.session_count(), 1);
    }

    #[tokio::test]
    async fn test_join_notifies_existing_members_only() {
        let mut h = Harness::new();
        let mut s1 = h.connect("s1");
        let mut s2 = h.connect("s2");

        h.join("s1", "u1", "alice", "room1");
        assert!(drain(&mut s1).is_empty(), "first joiner has nobody to notify");

        h.join("s2", "u2", "bob", "room1");
        assert_eq!(drain(&mut s1), vec![get_offer("s2")]);
        assert!(drain(&mut s2).is_empty(), "joiner is not asked to offer to itself");
        assert_eq!(h.state.directory().members("room1").len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected_without_side_effects() {
        let mut h = Harness::new();
        let mut s1 = h.connect("s1");
        let mut s2 = h.connect("s2");
        h.join("s1", "u1", "alice", "room1");

        h.join("s2", "u2", "alice", "room1");

        assert_eq!(
            drain(&mut s2),
            vec![ServerEvent::Error(ErrorNotice::repeat())]
        );
        assert!(drain(&mut s1).is_empty());
        assert_eq!(h.state.directory().members("room1"), vec!["u1".to_string()]);
        assert!(h.state.registry().lookup("s2").unwrap().user_id.is_none());
    }

    #[tokio::test]
    async fn test_same_name_in_other_room_is_allowed() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let _s2 = h.connect("s2");
        h.join("s1", "u1", "alice", "room1");
        h.join("s2", "u2", "alice", "room2");

        assert_eq!(h.state.room_count(), 2);
    }

    #[tokio::test]
    async fn test_offer_records_sender_under_target_and_forwards() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let mut s2 = h.connect("s2");
        h.join("s1", "u1", "alice", "room1");
        h.join("s2", "u2", "bob", "room1");

        h.offer("s1", "s2", "c1", StreamType::Primary);

        assert_eq!(
            drain(&mut s2),
            vec![ServerEvent::Offer(OfferNotice {
                remote_connector_id: "c1".to_string(),
                offer: json!({"sdp": "offer"}),
                member_id: "s1".to_string(),
                stream_type: StreamType::Primary,
            })]
        );
        let u2 = h.state.directory().get("u2").unwrap();
        assert_eq!(
            u2.connectors.peer(StreamType::Primary, "c1"),
            Some(&"s1".to_string())
        );
        assert!(h.state.directory().get("u1").unwrap().connectors.is_empty());
    }

    #[tokio::test]
    async fn test_answer_swaps_connector_ids() {
        let mut h = Harness::new();
        let mut s1 = h.connect("s1");
        let _s2 = h.connect("s2");
        h.join("s1", "u1", "alice", "room1");
        h.join("s2", "u2", "bob", "room1");
        drain(&mut s1);

        h.state.handle_event(
            "s2",
            ClientEvent::Answer(AnswerRequest {
                remote_connector_id: "c1".to_string(),
                connector_id: "c9".to_string(),
                answer: json!("answer-sdp"),
                member_id: "s1".to_string(),
                stream_type: StreamType::Display,
            }),
        );

        assert_eq!(
            drain(&mut s1),
            vec![ServerEvent::Answer(AnswerNotice {
                remote_connector_id: "c9".to_string(),
                connector_id: "c1".to_string(),
                answer: json!("answer-sdp"),
                member_id: "s2".to_string(),
            })]
        );
        assert_eq!(
            h.state
                .directory()
                .get("u1")
                .unwrap()
                .connectors
                .peer(StreamType::Display, "c9"),
            Some(&"s2".to_string())
        );
    }

    #[tokio::test]
    async fn test_candidate_is_rekeyed_without_bookkeeping() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let mut s2 = h.connect("s2");
        h.join("s2", "u2", "bob", "room1");

        h.state.handle_event(
            "s1",
            ClientEvent::IceCandidate(CandidateRequest {
                remote_connector_id: "c9".to_string(),
                member_id: "s2".to_string(),
                candidate: json!({"candidate": "a=1"}),
            }),
        );

        assert_eq!(
            drain(&mut s2),
            vec![ServerEvent::IceCandidate(CandidateNotice {
                connector_id: "c9".to_string(),
                candidate: json!({"candidate": "a=1"}),
            })]
        );
        assert!(h.state.directory().get("u2").unwrap().connectors.is_empty());
    }

    #[tokio::test]
    async fn test_relay_to_unknown_session_is_silent() {
        let mut h = Harness::new();
        let mut s1 = h.connect("s1");
        h.join("s1", "u1", "alice", "room1");

        h.offer("s1", "ghost", "c1", StreamType::Primary);

        assert!(drain(&mut s1).is_empty());
        assert!(h.state.directory().get("u1").unwrap().connectors.is_empty());
    }

    #[tokio::test]
    async fn test_offer_to_unbound_session_still_forwards() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let mut s2 = h.connect("s2");

        h.offer("s1", "s2", "c1", StreamType::Primary);

        assert_eq!(drain(&mut s2).len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_work_is_relayed_verbatim() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let mut s2 = h.connect("s2");

        h.state.handle_event(
            "s1",
            ClientEvent::ReconnectWork(ReconnectWork {
                kind: "answer".to_string(),
                data: Some(json!("sdp")),
                connector_id: Some("c4".to_string()),
                member_id: "s2".to_string(),
            }),
        );

        assert_eq!(
            drain(&mut s2),
            vec![ServerEvent::Reconnect(ReconnectNotice {
                kind: "answer".to_string(),
                member_id: Some("s2".to_string()),
                connector_id: Some("c4".to_string()),
                data: Some(json!("sdp")),
            })]
        );
    }

    #[tokio::test]
    async fn test_leave_removes_record_and_notifies_targets() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let mut s2 = h.connect("s2");
        h.join("s2", "u2", "bob", "room1");
        h.join("s1", "u1", "alice", "room1");
        drain(&mut s2);

        h.state.handle_event(
            "s1",
            ClientEvent::Leave(vec![LeaveTarget {
                remote_connector_id: "c7".to_string(),
                member_id: "s2".to_string(),
            }]),
        );

        assert_eq!(
            drain(&mut s2),
            vec![ServerEvent::Leave(LeaveNotice {
                connector_id: "c7".to_string(),
                member_id: "s1".to_string(),
            })]
        );
        assert!(h.state.directory().get("u1").is_none());
        assert!(h.state.registry().lookup("s1").unwrap().user_id.is_none());
    }

    #[tokio::test]
    async fn test_leave_last_member_deletes_room() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        h.join("s1", "u1", "alice", "room1");

        h.state.handle_event("s1", ClientEvent::Leave(Vec::new()));

        assert!(!h.state.directory().contains_room("room1"));
    }

    #[tokio::test]
    async fn test_leave_from_unbound_session_is_ignored() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let mut s2 = h.connect("s2");

        h.state.handle_event(
            "s1",
            ClientEvent::Leave(vec![LeaveTarget {
                remote_connector_id: "c1".to_string(),
                member_id: "s2".to_string(),
            }]),
        );

        assert!(drain(&mut s2).is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_unknown_identity_falls_through_to_join() {
        let mut h = Harness::new();
        let mut s1 = h.connect("s1");
        let mut s3 = h.connect("s3");
        h.join("s1", "u1", "alice", "room1");

        h.reconnect("s3", "u9", "room1");

        assert_eq!(
            drain(&mut s3),
            vec![ServerEvent::Reconnect(ReconnectNotice::fresh_leave())]
        );
        assert_eq!(drain(&mut s1), vec![get_offer("s3")]);
        assert_eq!(h.state.directory().get("u9").unwrap().display_name, "u9");
    }

    #[tokio::test]
    async fn test_reconnect_partitions_peers() {
        let mut h = Harness::new();
        let mut s1 = h.connect("s1");
        let mut s2 = h.connect("s2");
        let mut s4 = h.connect("s4");
        h.join("s1", "u1", "alice", "room1");
        h.join("s2", "u2", "bob", "room1");

        // u1 holds connectors to s2 (present) and s5 (never in the room).
        h.offer("s2", "s1", "c-bob", StreamType::Primary);
        let _s5 = h.connect("s5");
        h.offer("s5", "s1", "c-gone", StreamType::Display);
        h.state.disconnect("s5");

        // u1 drops; carol joins meanwhile.
        h.state.disconnect("s1");
        h.join("s4", "u4", "carol", "room1");
        drain(&mut s2);
        drain(&mut s4);
        drop(drain(&mut s1));

        let mut s3 = h.connect("s3");
        h.reconnect("s3", "u1", "room1");

        assert_eq!(
            drain(&mut s2),
            vec![ServerEvent::Reconnect(ReconnectNotice::renegotiate("c-bob"))]
        );
        assert_eq!(drain(&mut s4), vec![get_offer("s3")]);
        assert_eq!(
            drain(&mut s3),
            vec![ServerEvent::Reconnect(ReconnectNotice::peer_left("s5"))]
        );

        let record = h.state.directory().get("u1").unwrap();
        assert_eq!(record.session_id, "s3");
        assert_eq!(record.connectors.peer(StreamType::Display, "c-gone"), None);
        assert_eq!(
            record.connectors.peer(StreamType::Primary, "c-bob"),
            Some(&"s2".to_string())
        );
        assert_eq!(
            h.state.registry().lookup("s3").unwrap().user_id.as_deref(),
            Some("u1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_cancels_pending_eviction() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        h.join("s1", "u1", "alice", "room1");
        h.state.disconnect("s1");

        tokio::time::advance(Duration::from_secs(5)).await;
        let _s3 = h.connect("s3");
        h.reconnect("s3", "u1", "room1");

        tokio::time::advance(Duration::from_secs(30)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.tickets.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_evict_removes_record_and_notifies_resolvable_peers() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let mut s2 = h.connect("s2");
        h.join("s1", "u1", "alice", "room1");
        h.join("s2", "u2", "bob", "room1");
        h.offer("s2", "s1", "c1", StreamType::Primary);
        h.offer("s2", "s1", "c2", StreamType::RemoteDisplay);
        h.state
            .directory
            .get_mut("u1")
            .unwrap()
            .connectors
            .record(StreamType::Display, "c3", "ghost");
        h.state.disconnect("s1");
        drain(&mut s2);

        let outcome = h.state.evict(&EvictionTicket {
            identity_id: "u1".to_string(),
            session_id: "s1".to_string(),
        });

        assert_eq!(
            outcome,
            EvictionOutcome::Evicted {
                notified: 2,
                failed: 0
            }
        );
        assert_eq!(
            drain(&mut s2),
            vec![
                ServerEvent::Leave(LeaveNotice {
                    connector_id: "c1".to_string(),
                    member_id: "s1".to_string(),
                }),
                ServerEvent::Leave(LeaveNotice {
                    connector_id: "c2".to_string(),
                    member_id: "s1".to_string(),
                }),
            ]
        );
        assert!(h.state.directory().get("u1").is_none());
        assert_eq!(h.state.directory().members("room1"), vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn test_evict_counts_failed_notifications_and_completes() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let s2 = h.connect("s2");
        h.join("s1", "u1", "alice", "room1");
        h.offer("s2", "s1", "c1", StreamType::Primary);
        h.state.disconnect("s1");
        drop(s2);

        let outcome = h.state.evict(&EvictionTicket {
            identity_id: "u1".to_string(),
            session_id: "s1".to_string(),
        });

        assert_eq!(
            outcome,
            EvictionOutcome::Evicted {
                notified: 0,
                failed: 1
            }
        );
        assert_eq!(h.state.room_count(), 0);
    }

    #[tokio::test]
    async fn test_evict_stale_and_unknown_tickets_are_discarded() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        h.join("s1", "u1", "alice", "room1");
        h.state.disconnect("s1");
        let _s3 = h.connect("s3");
        h.reconnect("s3", "u1", "room1");

        let stale = h.state.evict(&EvictionTicket {
            identity_id: "u1".to_string(),
            session_id: "s1".to_string(),
        });
        assert_eq!(stale, EvictionOutcome::Stale);
        assert!(h.state.directory().get("u1").is_some());

        let unknown = h.state.evict(&EvictionTicket {
            identity_id: "nobody".to_string(),
            session_id: "s1".to_string(),
        });
        assert_eq!(unknown, EvictionOutcome::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_session_disconnect_arms_nothing() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        h.join("s1", "u1", "alice", "room1");
        let _s3 = h.connect("s3");
        h.reconnect("s3", "u1", "room1");

        h.state.disconnect("s1");

        tokio::time::advance(Duration::from_secs(20)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.tickets.try_recv().is_err());
        assert_eq!(h.state.directory().get("u1").unwrap().session_id, "s3");
    }

    #[tokio::test]
    async fn test_join_under_new_identity_drops_previous_record() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        h.join("s1", "u1", "alice", "room1");

        h.join("s1", "u7", "alice-2", "room2");

        assert!(h.state.directory().get("u1").is_none());
        assert!(!h.state.directory().contains_room("room1"));
        assert!(h.state.directory().get("u7").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_as_other_identity_drops_previous_record() {
        let mut h = Harness::new();
        let _s1 = h.connect("s1");
        let _s2 = h.connect("s2");
        h.join("s1", "u1", "alice", "roomA");
        h.join("s2", "u2", "bob", "roomB");
        h.state.disconnect("s2");

        h.reconnect("s1", "u2", "roomB");

        assert!(h.state.directory().get("u1").is_none());
        assert!(!h.state.directory().contains_room("roomA"));
        assert!(!h.state.is_name_taken("roomA", "alice"));
        assert_eq!(h.state.directory().get("u2").unwrap().session_id, "s1");
        assert_eq!(
            h.state.registry().lookup("s1").unwrap().user_id.as_deref(),
            Some("u2")
        );

        // The resumed identity is the only thing left to evict.
        h.state.disconnect("s1");
        tokio::time::advance(Duration::from_secs(15)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let ticket = h.tickets.try_recv().unwrap();
        assert_eq!(ticket.identity_id, "u2");
        assert_eq!(ticket.session_id, "s1");
        assert!(h.tickets.try_recv().is_err());

        h.state.evict(&ticket);
        assert_eq!(h.state.member_count(), 0);
        assert_eq!(h.state.room_count(), 0);
    }
}
