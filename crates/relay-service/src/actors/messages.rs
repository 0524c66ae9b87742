//! Messages accepted by the signaling actor.

use crate::protocol::{ClientEvent, SessionId};
use crate::state::{EvictionTicket, MemberInfo, SessionHandle};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::oneshot;

/// Signaling actor mailbox message.
#[derive(Debug)]
pub enum SignalingMessage {
    /// A transport session opened.
    Connect {
        handle: SessionHandle,
        respond_to: oneshot::Sender<()>,
    },

    /// A transport session closed.
    Disconnect { session_id: SessionId },

    /// An inbound event from a session.
    ClientEvent {
        session_id: SessionId,
        event: ClientEvent,
    },

    /// An eviction timer fired.
    EvictionDue(EvictionTicket),

    /// Username availability query.
    CheckUsername {
        username: String,
        room_name: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// State snapshot query.
    GetState {
        respond_to: oneshot::Sender<RelayState>,
    },
}

impl SignalingMessage {
    /// Message kind, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Connect { .. } => "connect",
            SignalingMessage::Disconnect { .. } => "disconnect",
            SignalingMessage::ClientEvent { event, .. } => event.name(),
            SignalingMessage::EvictionDue(_) => "eviction_due",
            SignalingMessage::CheckUsername { .. } => "check_username",
            SignalingMessage::GetState { .. } => "get_state",
        }
    }
}

/// Point-in-time view of the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayState {
    /// Room name to members.
    pub rooms: BTreeMap<String, Vec<MemberInfo>>,
    pub session_count: usize,
    pub room_count: usize,
    pub member_count: usize,
    pub mailbox_depth: usize,
}

impl RelayState {
    /// Identity ids in a room, or empty if the room does not exist.
    #[must_use]
    pub fn room_members(&self, room_name: &str) -> Vec<&str> {
        self.rooms
            .get(room_name)
            .map(|members| members.iter().map(|m| m.id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Member info for an identity, wherever it is.
    #[must_use]
    pub fn member(&self, identity_id: &str) -> Option<&MemberInfo> {
        self.rooms
            .values()
            .flat_map(|members| members.iter())
            .find(|m| m.id == identity_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn state() -> RelayState {
        RelayState {
            rooms: BTreeMap::from([(
                "room1".to_string(),
                vec![MemberInfo {
                    id: "u1".to_string(),
                    username: "alice".to_string(),
                    session_id: "s1".to_string(),
                }],
            )]),
            session_count: 1,
            room_count: 1,
            member_count: 1,
            mailbox_depth: 0,
        }
    }

    #[test]
    fn test_room_members() {
        let state = state();
        assert_eq!(state.room_members("room1"), vec!["u1"]);
        assert!(state.room_members("room2").is_empty());
    }

    #[test]
    fn test_member_lookup() {
        let state = state();
        assert_eq!(state.member("u1").unwrap().session_id, "s1");
        assert!(state.member("u2").is_none());
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let value = serde_json::to_value(state()).unwrap();
        assert_eq!(value["sessionCount"], 1);
        assert_eq!(value["rooms"]["room1"][0]["sessionId"], "s1");
    }

    #[test]
    fn test_message_kind() {
        let (tx, _rx) = oneshot::channel();
        assert_eq!(SignalingMessage::GetState { respond_to: tx }.kind(), "get_state");
        assert_eq!(
            SignalingMessage::Disconnect {
                session_id: "s1".to_string()
            }
            .kind(),
            "disconnect"
        );
    }
}
