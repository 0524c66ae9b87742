//! Debounced delay-and-cancel primitive.
//!
//! A [`Debouncer`] runs an action once a fixed delay has passed since the
//! most recent [`Debouncer::trigger`]. Triggering again restarts the delay
//! with the latest arguments. A [`CancelHandle`] taken from the debouncer
//! can abort whatever is pending from anywhere, including after the
//! debouncer itself has been dropped.
//!
//! Every trigger bumps a generation counter. A timer only fires its action
//! if the generation it was armed with is still current, so a cancel that
//! races a timer already past its sleep is still honoured.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Future returned by a debounced action.
pub type DebounceFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type Action<A> = Arc<dyn Fn(A) -> DebounceFuture + Send + Sync>;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl Slot {
    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    // Slot holds no invariants a panicking holder could break.
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delays an action until triggers stop arriving for `delay`.
pub struct Debouncer<A> {
    delay: Duration,
    action: Action<A>,
    slot: Arc<Mutex<Slot>>,
}

impl<A> std::fmt::Debug for Debouncer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl<A> Debouncer<A> {
    /// Configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether an action is scheduled and has not yet fired.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }

    /// Handle that cancels whatever is pending on this debouncer.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Cancel whatever is pending.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }
}

impl<A> Debouncer<A>
where
    A: Send + 'static,
{
    /// Create a debouncer around `action`.
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn(A) -> DebounceFuture + Send + Sync + 'static,
    {
        Self {
            delay,
            action: Arc::new(action),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Schedule the action with `args`, replacing anything pending.
    ///
    /// The delay counts from this call, not from when the timer task first
    /// runs. Must be called from within a Tokio runtime.
    pub fn trigger(&self, args: A) {
        let deadline = Instant::now() + self.delay;
        let mut slot = lock(&self.slot);
        slot.abort_pending();
        slot.generation = slot.generation.wrapping_add(1);
        let armed = slot.generation;

        let action = Arc::clone(&self.action);
        let shared = Arc::clone(&self.slot);

        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            {
                let mut slot = lock(&shared);
                if slot.generation != armed {
                    return;
                }
                slot.pending = None;
            }

            // Run outside the lock so the action may re-trigger or cancel.
            action(args).await;
        }));
    }
}

/// Cancels the pending action of a [`Debouncer`].
///
/// Cheap to clone. Cancelling with nothing pending is a no-op.
#[derive(Clone)]
pub struct CancelHandle {
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}

impl CancelHandle {
    /// Abort the pending action, if any.
    pub fn cancel(&self) {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        slot.abort_pending();
    }

    /// Whether both handles cancel the same debouncer.
    #[must_use]
    pub fn same_target(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}
