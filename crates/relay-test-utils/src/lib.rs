//! # Relay Test Utilities
//!
//! Shared test helpers for the signaling relay.
//!
//! - `session` - In-process sessions attached to a running signaling actor
//! - `fixtures` - Client event builders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (signaling, _task) = spawn_relay(Duration::from_secs(15));
//!
//!     let mut alice = TestSession::connect(&signaling).await;
//!     let mut bob = TestSession::connect(&signaling).await;
//!
//!     alice.send(join_event("u1", "alice", "room1")).await;
//!     bob.send(join_event("u2", "bob", "room1")).await;
//!     settle(&signaling).await;
//!
//!     alice.expect_get_offer(bob.session_id());
//! }
//! ```

pub mod fixtures;
pub mod session;

pub use fixtures::*;
pub use session::*;
