//! Wire events exchanged with signaling clients.
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": <payload>}`.
//! Inbound frames decode to [`ClientEvent`], outbound frames encode from
//! [`ServerEvent`]. Field names are camelCase on the wire.
//!
//! SDP offers/answers and ICE candidates are opaque to the relay and are
//! carried as raw JSON values.

use crate::state::connectors::StreamType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server-assigned transport session identifier.
pub type SessionId = String;

/// Caller-supplied identity, stable across reconnects.
pub type IdentityId = String;

/// Caller-chosen id scoping one negotiated pairing within a stream type.
pub type ConnectorId = String;

/// `type` value of a reconnect notice telling the recipient a peer is gone.
pub const RECONNECT_TYPE_LEAVE: &str = "leave";

/// `type` value of a reconnect notice asking the recipient to renegotiate.
pub const RECONNECT_TYPE_GET_OFFER: &str = "getOffer";

/// `type` value of the duplicate-name error.
pub const ERROR_TYPE_REPEAT: &str = "repeat";

/// Message sent with the duplicate-name error.
pub const ERROR_MESSAGE_REPEAT: &str = "This username already exists in this room";

// ----------------------------------------------------------------------------
// Inbound
// ----------------------------------------------------------------------------

/// Events received from a client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Join a room under a display name.
    #[serde(rename = "join")]
    Join(JoinRequest),

    /// Send an SDP offer to another session.
    #[serde(rename = "offer")]
    Offer(OfferRequest),

    /// Send an SDP answer back to the offering session.
    #[serde(rename = "answer")]
    Answer(AnswerRequest),

    /// Send an ICE candidate to another session.
    #[serde(rename = "icecandidate")]
    IceCandidate(CandidateRequest),

    /// Resume an identity after a transport drop.
    #[serde(rename = "reconnect")]
    Reconnect(ReconnectRequest),

    /// Peer-to-peer renegotiation traffic relayed as a `reconnect` event.
    #[serde(rename = "reconnectWork")]
    ReconnectWork(ReconnectWork),

    /// Leave the room, notifying each listed connector peer.
    #[serde(rename = "leave")]
    Leave(Vec<LeaveTarget>),
}

impl ClientEvent {
    /// Event name, used for logging and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => "join",
            ClientEvent::Offer(_) => "offer",
            ClientEvent::Answer(_) => "answer",
            ClientEvent::IceCandidate(_) => "icecandidate",
            ClientEvent::Reconnect(_) => "reconnect",
            ClientEvent::ReconnectWork(_) => "reconnectWork",
            ClientEvent::Leave(_) => "leave",
        }
    }
}

/// Payload of `join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Identity id.
    pub id: IdentityId,
    /// Display name, unique within the room.
    pub username: String,
    /// Room to join.
    pub roomname: String,
}

/// Payload of inbound `offer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    /// Connector id chosen by the offering side.
    pub connector_id: ConnectorId,
    /// Opaque SDP offer.
    pub offer: Value,
    /// Target session id.
    pub member_id: SessionId,
    /// Stream the offer negotiates.
    pub stream_type: StreamType,
}

/// Payload of inbound `answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    /// Connector id the offerer chose (received as `remoteConnectorId`).
    pub remote_connector_id: ConnectorId,
    /// Fresh connector id chosen by the answering side.
    pub connector_id: ConnectorId,
    /// Opaque SDP answer.
    pub answer: Value,
    /// Target (offering) session id.
    pub member_id: SessionId,
    /// Stream the answer negotiates.
    pub stream_type: StreamType,
}

/// Payload of inbound `icecandidate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    /// Connector id the target knows this pairing by.
    pub remote_connector_id: ConnectorId,
    /// Target session id.
    pub member_id: SessionId,
    /// Opaque ICE candidate.
    pub candidate: Value,
}

/// Payload of inbound `reconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectRequest {
    /// Identity id to resume.
    pub id: IdentityId,
    /// Room the client believes it is in.
    pub roomname: String,
    /// Display name to use if the identity is unknown and a fresh join happens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Payload of `reconnectWork`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectWork {
    /// Client-defined renegotiation step.
    #[serde(rename = "type")]
    pub kind: String,
    /// Client-defined payload (usually SDP).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Connector id the target knows this pairing by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<ConnectorId>,
    /// Target session id.
    pub member_id: SessionId,
}

/// One entry of an inbound `leave` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveTarget {
    /// Connector id the target knows this pairing by.
    pub remote_connector_id: ConnectorId,
    /// Target session id.
    pub member_id: SessionId,
}

// ----------------------------------------------------------------------------
// Outbound
// ----------------------------------------------------------------------------

/// Events delivered to a client session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// First frame on every session: the server-assigned session id.
    #[serde(rename = "connect")]
    Connected(ConnectedNotice),

    /// Relayed SDP offer.
    #[serde(rename = "offer")]
    Offer(OfferNotice),

    /// Relayed SDP answer.
    #[serde(rename = "answer")]
    Answer(AnswerNotice),

    /// Relayed ICE candidate.
    #[serde(rename = "icecandidate")]
    IceCandidate(CandidateNotice),

    /// Instructs the recipient to originate an offer toward `memberId`.
    #[serde(rename = "getOffer")]
    GetOffer(GetOfferNotice),

    /// Reconnect reconciliation or relayed renegotiation traffic.
    #[serde(rename = "reconnect")]
    Reconnect(ReconnectNotice),

    /// A peer left.
    #[serde(rename = "leave")]
    Leave(LeaveNotice),

    /// Request rejected.
    #[serde(rename = "error")]
    Error(ErrorNotice),
}

impl ServerEvent {
    /// Event name, used for logging and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connect",
            ServerEvent::Offer(_) => "offer",
            ServerEvent::Answer(_) => "answer",
            ServerEvent::IceCandidate(_) => "icecandidate",
            ServerEvent::GetOffer(_) => "getOffer",
            ServerEvent::Reconnect(_) => "reconnect",
            ServerEvent::Leave(_) => "leave",
            ServerEvent::Error(_) => "error",
        }
    }
}

/// Payload of `connect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedNotice {
    /// Session id assigned to this connection.
    pub session_id: SessionId,
}

/// Payload of outbound `offer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferNotice {
    /// Connector id chosen by the offering side.
    pub remote_connector_id: ConnectorId,
    /// Opaque SDP offer.
    pub offer: Value,
    /// Offering session id, where the answer goes.
    pub member_id: SessionId,
    /// Stream the offer negotiates.
    pub stream_type: StreamType,
}

/// Payload of outbound `answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerNotice {
    /// Connector id chosen by the answering side.
    pub remote_connector_id: ConnectorId,
    /// The recipient's own connector id from its offer.
    pub connector_id: ConnectorId,
    /// Opaque SDP answer.
    pub answer: Value,
    /// Answering session id.
    pub member_id: SessionId,
}

/// Payload of outbound `icecandidate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateNotice {
    /// The recipient's own connector id for this pairing.
    pub connector_id: ConnectorId,
    /// Opaque ICE candidate.
    pub candidate: Value,
}

/// Payload of `getOffer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOfferNotice {
    /// Session the recipient should offer to.
    pub member_id: SessionId,
}

/// Payload of outbound `reconnect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectNotice {
    /// `leave`, `getOffer`, or a client-defined step from `reconnectWork`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Session the notice concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<SessionId>,
    /// Connector the notice concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<ConnectorId>,
    /// Relayed `reconnectWork` payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ReconnectNotice {
    /// The server no longer knows the identity; the client must start over.
    #[must_use]
    pub fn fresh_leave() -> Self {
        Self {
            kind: RECONNECT_TYPE_LEAVE.to_string(),
            member_id: None,
            connector_id: None,
            data: None,
        }
    }

    /// Ask a still-present peer to renegotiate under its existing connector.
    #[must_use]
    pub fn renegotiate(connector_id: impl Into<ConnectorId>) -> Self {
        Self {
            kind: RECONNECT_TYPE_GET_OFFER.to_string(),
            member_id: None,
            connector_id: Some(connector_id.into()),
            data: None,
        }
    }

    /// Tell the reconnecting session a former peer is gone.
    #[must_use]
    pub fn peer_left(member_id: impl Into<SessionId>) -> Self {
        Self {
            kind: RECONNECT_TYPE_LEAVE.to_string(),
            member_id: Some(member_id.into()),
            connector_id: None,
            data: None,
        }
    }
}

impl From<ReconnectWork> for ReconnectNotice {
    fn from(work: ReconnectWork) -> Self {
        Self {
            kind: work.kind,
            member_id: Some(work.member_id),
            connector_id: work.connector_id,
            data: work.data,
        }
    }
}

/// Payload of outbound `leave`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveNotice {
    /// The recipient's own connector id for the departed pairing.
    pub connector_id: ConnectorId,
    /// Session that left.
    pub member_id: SessionId,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// Error category.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorNotice {
    /// Duplicate display name in the requested room.
    #[must_use]
    pub fn repeat() -> Self {
        Self {
            kind: ERROR_TYPE_REPEAT.to_string(),
            message: ERROR_MESSAGE_REPEAT.to_string(),
        }
    }
}

/// Decode an inbound text frame.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Encode an outbound event as a text frame.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_join() {
        let event = decode_client_event(
            r#"{"event":"join","data":{"id":"u1","username":"alice","roomname":"room1"}}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::Join(JoinRequest {
                id: "u1".to_string(),
                username: "alice".to_string(),
                roomname: "room1".to_string(),
            })
        );
        assert_eq!(event.name(), "join");
    }

    #[test]
    fn test_decode_offer_uses_wire_stream_names() {
        let event = decode_client_event(
            r#"{"event":"offer","data":{"connectorId":"c1","offer":{"sdp":"v=0"},"memberId":"s2","streamType":"remoteDisplay"}}"#,
        )
        .unwrap();

        match event {
            ClientEvent::Offer(offer) => {
                assert_eq!(offer.connector_id, "c1");
                assert_eq!(offer.member_id, "s2");
                assert_eq!(offer.stream_type, StreamType::RemoteDisplay);
                assert_eq!(offer.offer, json!({"sdp": "v=0"}));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_primary_stream_is_user_on_the_wire() {
        let event = decode_client_event(
            r#"{"event":"answer","data":{"remoteConnectorId":"c1","connectorId":"c9","answer":"sdp","memberId":"s1","streamType":"user"}}"#,
        )
        .unwrap();

        assert!(matches!(
            event,
            ClientEvent::Answer(AnswerRequest {
                stream_type: StreamType::Primary,
                ..
            })
        ));
    }

    #[test]
    fn test_decode_unknown_stream_type_fails() {
        let result = decode_client_event(
            r#"{"event":"offer","data":{"connectorId":"c1","offer":{},"memberId":"s2","streamType":"audioOnly"}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_event_fails() {
        assert!(decode_client_event(r#"{"event":"chat","data":{}}"#).is_err());
        assert!(decode_client_event("not json").is_err());
    }

    #[test]
    fn test_decode_leave_list() {
        let event = decode_client_event(
            r#"{"event":"leave","data":[{"remoteConnectorId":"c1","memberId":"s2"},{"remoteConnectorId":"c2","memberId":"s3"}]}"#,
        )
        .unwrap();

        match event {
            ClientEvent::Leave(targets) => {
                assert_eq!(targets.len(), 2);
                assert_eq!(targets[1].member_id, "s3");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_reconnect_without_username() {
        let event =
            decode_client_event(r#"{"event":"reconnect","data":{"id":"u1","roomname":"room1"}}"#)
                .unwrap();

        assert_eq!(
            event,
            ClientEvent::Reconnect(ReconnectRequest {
                id: "u1".to_string(),
                roomname: "room1".to_string(),
                username: None,
            })
        );
    }

    #[test]
    fn test_encode_get_offer() {
        let text = encode_server_event(&ServerEvent::GetOffer(GetOfferNotice {
            member_id: "s2".to_string(),
        }))
        .unwrap();

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"event": "getOffer", "data": {"memberId": "s2"}}));
    }

    #[test]
    fn test_encode_reconnect_notices_omit_absent_fields() {
        let fresh = serde_json::to_value(ServerEvent::Reconnect(ReconnectNotice::fresh_leave()))
            .unwrap();
        assert_eq!(fresh, json!({"event": "reconnect", "data": {"type": "leave"}}));

        let renegotiate =
            serde_json::to_value(ServerEvent::Reconnect(ReconnectNotice::renegotiate("c7")))
                .unwrap();
        assert_eq!(
            renegotiate,
            json!({"event": "reconnect", "data": {"type": "getOffer", "connectorId": "c7"}})
        );

        let left =
            serde_json::to_value(ServerEvent::Reconnect(ReconnectNotice::peer_left("s4")))
                .unwrap();
        assert_eq!(
            left,
            json!({"event": "reconnect", "data": {"type": "leave", "memberId": "s4"}})
        );
    }

    #[test]
    fn test_reconnect_work_relays_verbatim() {
        let work = ReconnectWork {
            kind: "offer".to_string(),
            data: Some(json!({"sdp": "v=0"})),
            connector_id: Some("c3".to_string()),
            member_id: "s5".to_string(),
        };

        let value = serde_json::to_value(ServerEvent::Reconnect(work.into())).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "reconnect",
                "data": {"type": "offer", "data": {"sdp": "v=0"}, "connectorId": "c3", "memberId": "s5"}
            })
        );
    }

    #[test]
    fn test_encode_repeat_error() {
        let value = serde_json::to_value(ServerEvent::Error(ErrorNotice::repeat())).unwrap();
        assert_eq!(value["event"], "error");
        assert_eq!(value["data"]["type"], "repeat");
        assert_eq!(value["data"]["message"], ERROR_MESSAGE_REPEAT);
    }
}
