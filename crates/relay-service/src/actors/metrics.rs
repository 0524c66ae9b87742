//! Mailbox monitoring for the signaling actor.
//!
//! | Level    | Depth       |
//! |----------|-------------|
//! | Normal   | <= 500      |
//! | Warning  | 501 - 2000  |
//! | Critical | > 2000      |
//!
//! Senders call [`MailboxMonitor::record_enqueue`] before queueing and the
//! actor calls [`MailboxMonitor::record_dequeue`] after receiving, so the
//! depth counts messages in flight.

use crate::observability::metrics::{record_message_dropped, set_actor_mailbox_depth};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Depth at or below which the mailbox is healthy.
pub const SIGNALING_MAILBOX_NORMAL: usize = 500;

/// Depth above which the mailbox is critical.
pub const SIGNALING_MAILBOX_WARNING: usize = 2000;

/// Actor type label for metrics.
pub const SIGNALING_ACTOR_TYPE: &str = "signaling";

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Queue depth tracking shared by the actor and everything that sends to it.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record a message about to be queued.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);

        match Self::level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "relay.actor.mailbox",
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    threshold = SIGNALING_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            MailboxLevel::Warning if new_depth == SIGNALING_MAILBOX_NORMAL + 1 => {
                // Once, on crossing
                debug!(
                    target: "relay.actor.mailbox",
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message taken off the queue by the actor.
    pub fn record_dequeue(&self) {
        // Saturating: a sender may fail to enqueue after counting.
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        set_actor_mailbox_depth(SIGNALING_ACTOR_TYPE, self.current_depth());
    }

    /// Record a message that was counted but never delivered.
    pub fn record_drop(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
        let dropped = self.messages_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        record_message_dropped("mailbox_closed");
        warn!(
            target: "relay.actor.mailbox",
            actor_id = %self.actor_id,
            dropped,
            "Message for signaling actor dropped"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        Self::level_for_depth(self.current_depth())
    }

    fn level_for_depth(depth: usize) -> MailboxLevel {
        if depth > SIGNALING_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > SIGNALING_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}
