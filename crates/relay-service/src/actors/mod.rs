//! Actor layer for the signaling relay.
//!
//! ```text
//! SignalingActor (singleton)
//! ├── owns SignalingState
//! └── one eviction Debouncer per connection
//!     └── fires EvictionDue back into the mailbox
//! ```
//!
//! # Modules
//!
//! - [`signaling`] - `SignalingActor` and its handle
//! - [`messages`] - Mailbox message types
//! - [`metrics`] - Mailbox monitoring

pub mod messages;
pub mod metrics;
pub mod signaling;

pub use messages::{RelayState, SignalingMessage};
pub use metrics::{MailboxLevel, MailboxMonitor};
pub use signaling::{SignalingActor, SignalingActorHandle};
