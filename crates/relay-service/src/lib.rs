//! Signaling Relay Service Library
//!
//! This library provides the core functionality for a room-based signaling
//! relay that brokers WebRTC connection setup between participants:
//!
//! - Room membership with one display name per room
//! - Offer/answer/candidate relay addressed by session id
//! - Per-user, per-stream connector bookkeeping
//! - Reconnect grace window with debounced eviction
//! - Reconnect reconciliation against current room membership
//!
//! # Architecture
//!
//! All signaling state is owned by a single actor so that every handler runs
//! to completion without interleaving:
//!
//! ```text
//! SignalingActor (singleton)
//! ├── owns SignalingState
//! │   ├── ConnectionRegistry  (session id -> Client)
//! │   └── RoomDirectory       (room -> members, identity -> UserRecord)
//! │       └── ConnectorMaps   (per stream type: connector id -> peer session)
//! └── receives EvictionDue from fired Debouncer timers
//!
//! WebSocket sessions ──dispatch──► SignalingActor mailbox ──deliver──► sessions
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Signaling actor and its handle
//! - [`state`] - Registry, directory, connector tracking and reconciliation
//! - [`scheduler`] - Debounced delay-and-cancel primitive
//! - [`protocol`] - Wire events exchanged with clients
//! - [`transport`] - WebSocket session handling
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with client-safe messages

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod protocol;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod transport;
