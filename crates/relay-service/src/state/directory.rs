//! Room & membership directory.
//!
//! Rooms hold identity ids; the records themselves live in one map keyed by
//! identity. A room exists only while it has members.

use crate::protocol::{IdentityId, SessionId};
use crate::scheduler::CancelHandle;
use crate::state::connectors::ConnectorMaps;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A participant known to the directory.
#[derive(Debug)]
pub struct UserRecord {
    pub identity_id: IdentityId,
    pub display_name: String,
    pub room_name: String,
    /// Session that most recently joined or reconnected as this identity.
    pub session_id: SessionId,
    /// Cancels the eviction armed by `session_id`'s connection.
    pub eviction: CancelHandle,
    pub connectors: ConnectorMaps,
}

impl UserRecord {
    pub fn new(
        identity_id: impl Into<IdentityId>,
        display_name: impl Into<String>,
        room_name: impl Into<String>,
        session_id: impl Into<SessionId>,
        eviction: CancelHandle,
    ) -> Self {
        Self {
            identity_id: identity_id.into(),
            display_name: display_name.into(),
            room_name: room_name.into(),
            session_id: session_id.into(),
            eviction,
            connectors: ConnectorMaps::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Room {
    members: BTreeSet<IdentityId>,
}

/// One member as reported in a room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub id: IdentityId,
    pub username: String,
    pub session_id: SessionId,
}

/// Rooms and the records of their members.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: BTreeMap<String, Room>,
    users: HashMap<IdentityId, UserRecord>,
}

impl RoomDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a member of `room_name` currently uses `display_name`.
    ///
    /// Both the join handler and the username HTTP query use this.
    #[must_use]
    pub fn is_name_taken(&self, room_name: &str, display_name: &str) -> bool {
        self.rooms.get(room_name).is_some_and(|room| {
            room.members.iter().any(|id| {
                self.users
                    .get(id)
                    .is_some_and(|record| record.display_name == display_name)
            })
        })
    }

    /// Identity ids of the members of a room, ascending.
    #[must_use]
    pub fn members(&self, room_name: &str) -> Vec<IdentityId> {
        self.rooms
            .get(room_name)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get(&self, identity_id: &str) -> Option<&UserRecord> {
        self.users.get(identity_id)
    }

    pub fn get_mut(&mut self, identity_id: &str) -> Option<&mut UserRecord> {
        self.users.get_mut(identity_id)
    }

    /// Insert (or overwrite) a record and add it to its room, creating the
    /// room if needed.
    ///
    /// An existing record for the same identity in another room is removed
    /// from that room first. Returns the replaced record, if any.
    pub fn insert(&mut self, record: UserRecord) -> Option<UserRecord> {
        let previous = self.remove(&record.identity_id);

        self.rooms
            .entry(record.room_name.clone())
            .or_default()
            .members
            .insert(record.identity_id.clone());
        self.users.insert(record.identity_id.clone(), record);

        previous
    }

    /// Remove a record from its room and from the identity map. The room is
    /// deleted if this was its last member.
    pub fn remove(&mut self, identity_id: &str) -> Option<UserRecord> {
        let record = self.users.remove(identity_id)?;

        let now_empty = match self.rooms.get_mut(&record.room_name) {
            Some(room) => {
                room.members.remove(identity_id);
                room.members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove(&record.room_name);
        }

        Some(record)
    }

    #[must_use]
    pub fn contains_room(&self, room_name: &str) -> bool {
        self.rooms.contains_key(room_name)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.users.len()
    }

    /// Room name to members, for diagnostics and state queries.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<MemberInfo>> {
        self.rooms
            .iter()
            .map(|(name, room)| {
                let members = room
                    .members
                    .iter()
                    .filter_map(|id| self.users.get(id))
                    .map(|record| MemberInfo {
                        id: record.identity_id.clone(),
                        username: record.display_name.clone(),
                        session_id: record.session_id.clone(),
                    })
                    .collect();
                (name.clone(), members)
            })
            .collect()
    }
}
