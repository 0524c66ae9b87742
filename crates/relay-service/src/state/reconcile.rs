//! Reconnect reconciliation.
//!
//! Given the sessions currently present in the room and the connectors the
//! reconnecting user held before the drop, partition the work needed to
//! converge both sides:
//!
//! - peers with no prior connector joined during the drop and must offer
//!   fresh toward the reconnecting session;
//! - prior connectors whose peer is still present renegotiate in place;
//! - prior connectors whose peer is gone are pruned and reported to the
//!   reconnecting session.
//!
//! Peers are compared by session id. Output order follows input order, so
//! identical inputs always give an identical plan.

use crate::protocol::SessionId;
use crate::state::connectors::ConnectorEntry;
use std::collections::HashSet;

/// Signals to emit for one reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Peers to send `getOffer` toward the reconnecting session.
    pub fresh_offers: Vec<SessionId>,
    /// Connectors whose peer should renegotiate under the existing id.
    pub renegotiate: Vec<ConnectorEntry>,
    /// Connectors to delete; their peers are reported as gone.
    pub departed: Vec<ConnectorEntry>,
}

pub fn reconcile(current_room_peers: &[SessionId], prior: &[ConnectorEntry]) -> ReconcilePlan {
    let present: HashSet<&str> = current_room_peers.iter().map(String::as_str).collect();
    let known: HashSet<&str> = prior.iter().map(|e| e.peer_session.as_str()).collect();

    let fresh_offers = current_room_peers
        .iter()
        .filter(|peer| !known.contains(peer.as_str()))
        .cloned()
        .collect();

    let (renegotiate, departed) = prior
        .iter()
        .cloned()
        .partition(|entry| present.contains(entry.peer_session.as_str()));

    ReconcilePlan {
        fresh_offers,
        renegotiate,
        departed,
    }
}
