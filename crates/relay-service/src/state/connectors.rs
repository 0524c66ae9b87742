//! Per-user connector bookkeeping.
//!
//! A user keeps one map per [`StreamType`] from a connector id to the peer
//! session on the other side of that pairing. The maps feed two things:
//! translating a departing user into `leave` notices for its peers, and
//! reconciling a reconnecting user against current room membership.

use crate::protocol::{ConnectorId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Media stream a connector negotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StreamType {
    /// Camera/microphone stream.
    #[serde(rename = "user")]
    Primary,
    /// Locally shared screen.
    #[serde(rename = "display")]
    Display,
    /// Screen shared by the remote peer.
    #[serde(rename = "remoteDisplay")]
    RemoteDisplay,
}

impl StreamType {
    /// All stream types, in iteration order.
    pub const ALL: [StreamType; 3] = [
        StreamType::Primary,
        StreamType::Display,
        StreamType::RemoteDisplay,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StreamType::Primary => "user",
            StreamType::Display => "display",
            StreamType::RemoteDisplay => "remoteDisplay",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connector and the peer it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorEntry {
    pub stream_type: StreamType,
    pub connector_id: ConnectorId,
    pub peer_session: SessionId,
}

/// Connector maps for one user, keyed by stream type.
///
/// Connector ids are unique within a stream type for a user. Recording an
/// existing id overwrites its peer.
#[derive(Debug, Clone, Default)]
pub struct ConnectorMaps {
    primary: BTreeMap<ConnectorId, SessionId>,
    display: BTreeMap<ConnectorId, SessionId>,
    remote_display: BTreeMap<ConnectorId, SessionId>,
}

impl ConnectorMaps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, stream_type: StreamType) -> &BTreeMap<ConnectorId, SessionId> {
        match stream_type {
            StreamType::Primary => &self.primary,
            StreamType::Display => &self.display,
            StreamType::RemoteDisplay => &self.remote_display,
        }
    }

    fn map_mut(&mut self, stream_type: StreamType) -> &mut BTreeMap<ConnectorId, SessionId> {
        match stream_type {
            StreamType::Primary => &mut self.primary,
            StreamType::Display => &mut self.display,
            StreamType::RemoteDisplay => &mut self.remote_display,
        }
    }

    /// Record (or overwrite) a connector.
    pub fn record(
        &mut self,
        stream_type: StreamType,
        connector_id: impl Into<ConnectorId>,
        peer_session: impl Into<SessionId>,
    ) {
        self.map_mut(stream_type)
            .insert(connector_id.into(), peer_session.into());
    }

    /// Remove a connector, returning the peer it pointed at.
    pub fn remove(&mut self, stream_type: StreamType, connector_id: &str) -> Option<SessionId> {
        self.map_mut(stream_type).remove(connector_id)
    }

    /// Peer session for a connector.
    #[must_use]
    pub fn peer(&self, stream_type: StreamType, connector_id: &str) -> Option<&SessionId> {
        self.map(stream_type).get(connector_id)
    }

    /// All connectors, stream types in [`StreamType::ALL`] order and connector
    /// ids ascending within each.
    #[must_use]
    pub fn entries(&self) -> Vec<ConnectorEntry> {
        StreamType::ALL
            .iter()
            .flat_map(|&stream_type| {
                self.map(stream_type)
                    .iter()
                    .map(move |(connector_id, peer)| ConnectorEntry {
                        stream_type,
                        connector_id: connector_id.clone(),
                        peer_session: peer.clone(),
                    })
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.primary.len() + self.display.len() + self.remote_display.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
