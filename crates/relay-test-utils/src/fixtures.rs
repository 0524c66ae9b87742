//! Client event builders.
//!
//! SDP and candidate payloads are opaque to the relay, so fixtures use small
//! JSON values tagged with the connector id to make forwarded payloads easy
//! to tell apart in assertions.

use relay_service::protocol::{
    AnswerRequest, CandidateRequest, ClientEvent, JoinRequest, LeaveTarget, OfferRequest,
    ReconnectRequest, ReconnectWork,
};
use relay_service::state::StreamType;
use serde_json::{json, Value};

/// Opaque SDP stand-in.
#[must_use]
pub fn sdp(kind: &str, connector_id: &str) -> Value {
    json!({ "type": kind, "sdp": format!("v=0 {connector_id}") })
}

/// `join` event.
#[must_use]
pub fn join_event(id: &str, username: &str, roomname: &str) -> ClientEvent {
    ClientEvent::Join(JoinRequest {
        id: id.to_string(),
        username: username.to_string(),
        roomname: roomname.to_string(),
    })
}

/// `offer` event addressed to `member_id`.
#[must_use]
pub fn offer_event(connector_id: &str, member_id: &str, stream_type: StreamType) -> ClientEvent {
    ClientEvent::Offer(OfferRequest {
        connector_id: connector_id.to_string(),
        offer: sdp("offer", connector_id),
        member_id: member_id.to_string(),
        stream_type,
    })
}

/// `answer` event answering `remote_connector_id`, addressed to `member_id`.
#[must_use]
pub fn answer_event(
    remote_connector_id: &str,
    connector_id: &str,
    member_id: &str,
    stream_type: StreamType,
) -> ClientEvent {
    ClientEvent::Answer(AnswerRequest {
        remote_connector_id: remote_connector_id.to_string(),
        connector_id: connector_id.to_string(),
        answer: sdp("answer", connector_id),
        member_id: member_id.to_string(),
        stream_type,
    })
}

/// `icecandidate` event addressed to `member_id`.
#[must_use]
pub fn candidate_event(remote_connector_id: &str, member_id: &str) -> ClientEvent {
    ClientEvent::IceCandidate(CandidateRequest {
        remote_connector_id: remote_connector_id.to_string(),
        member_id: member_id.to_string(),
        candidate: json!({ "candidate": "candidate:1 1 udp 2122260223 10.0.0.1 54321 typ host" }),
    })
}

/// `reconnect` event.
#[must_use]
pub fn reconnect_event(id: &str, roomname: &str, username: Option<&str>) -> ClientEvent {
    ClientEvent::Reconnect(ReconnectRequest {
        id: id.to_string(),
        roomname: roomname.to_string(),
        username: username.map(str::to_string),
    })
}

/// `reconnectWork` event addressed to `member_id`.
#[must_use]
pub fn reconnect_work_event(kind: &str, connector_id: Option<&str>, member_id: &str) -> ClientEvent {
    ClientEvent::ReconnectWork(ReconnectWork {
        kind: kind.to_string(),
        data: None,
        connector_id: connector_id.map(str::to_string),
        member_id: member_id.to_string(),
    })
}

/// `leave` event from `(remote_connector_id, member_id)` pairs.
#[must_use]
pub fn leave_event(targets: &[(&str, &str)]) -> ClientEvent {
    ClientEvent::Leave(
        targets
            .iter()
            .map(|(remote_connector_id, member_id)| LeaveTarget {
                remote_connector_id: (*remote_connector_id).to_string(),
                member_id: (*member_id).to_string(),
            })
            .collect(),
    )
}
