//! Signaling state owned by the signaling actor.
//!
//! Nothing in here is shared or locked: the actor holds the only
//! [`SignalingState`] and runs each operation to completion.

pub mod connectors;
pub mod directory;
pub mod reconcile;
pub mod registry;
pub mod signaling;

pub use connectors::{ConnectorEntry, ConnectorMaps, StreamType};
pub use directory::{MemberInfo, RoomDirectory, UserRecord};
pub use reconcile::{reconcile, ReconcilePlan};
pub use registry::{Client, ConnectionRegistry, EvictionTicket, SessionHandle};
pub use signaling::{EvictionOutcome, SignalingState};
