//! Subscription handle and delivery loop.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use stuff_core::Watcher;
use tokio::sync::mpsc;

use super::registry::LiveQueryRegistry;

thread_local! {
    /// Set while this thread is inside a watcher callback.
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Restores the previous `DELIVERING` value, also when the watcher panics.
struct DeliveringGuard(bool);

impl DeliveringGuard {
    fn enter() -> Self {
        Self(DELIVERING.with(|flag| flag.replace(true)))
    }
}

impl Drop for DeliveringGuard {
    fn drop(&mut self) {
        DELIVERING.with(|flag| flag.set(self.0));
    }
}

/// Identifier of a live subscription, unique within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Cancellation state shared by a [`Subscription`] handle, its registry
/// entry, and its delivery task.
///
/// Every delivery runs while holding `in_flight`. `cancel()` flips `active`
/// and then takes the same lock, so once it returns no delivery is running
/// and none will start.
///
/// A cancel issued from inside any watcher callback only flips `active`.
/// Waiting there could close a cycle: watcher A cancelling B while B is
/// cancelling A would leave each thread holding its own lock and waiting
/// for the other's.
#[derive(Debug)]
pub(crate) struct DeliveryControl {
    active: AtomicBool,
    in_flight: Mutex<()>,
}

impl DeliveryControl {
    pub(crate) fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            in_flight: Mutex::new(()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Runs `deliver` unless the subscription was cancelled.
    ///
    /// Returns `false` if cancelled.
    pub(crate) fn deliver(&self, deliver: impl FnOnce()) -> bool {
        let _in_flight = self.in_flight.lock();
        if !self.is_active() {
            return false;
        }
        let _delivering = DeliveringGuard::enter();
        deliver();
        true
    }

    /// Stops future deliveries. Outside a watcher callback, also waits out
    /// a delivery running on another thread.
    pub(crate) fn cancel(&self) {
        self.active.store(false, Ordering::Release);
        if DELIVERING.with(Cell::get) {
            return;
        }
        drop(self.in_flight.lock());
    }
}

/// Drains queued results into the watcher until the channel closes or the
/// subscription is cancelled.
pub(crate) async fn deliver_loop<T>(
    id: SubscriptionId,
    mut results: mpsc::UnboundedReceiver<T>,
    watcher: Box<dyn Watcher<T>>,
    control: Arc<DeliveryControl>,
) where
    T: Send + Sync + 'static,
{
    let mut delivered = 0_u64;
    while let Some(result) = results.recv().await {
        if !control.deliver(|| watcher.on_changed(&result)) {
            break;
        }
        delivered += 1;
    }
    tracing::debug!(subscription = id.0, delivered, "delivery finished");
}

/// Handle to a live query registration.
///
/// Dropping the handle unsubscribes. Keep it alive for as long as the
/// watcher should receive results.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<LiveQueryRegistry>,
    control: Arc<DeliveryControl>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        registry: Weak<LiveQueryRegistry>,
        control: Arc<DeliveryControl>,
    ) -> Self {
        Self {
            id,
            registry,
            control,
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether results are still being delivered.
    ///
    /// Turns `false` on unsubscribe and when the database closes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.control.is_active()
    }

    /// Stops delivery to this subscription's watcher.
    ///
    /// The watcher will not be called again. Called outside any watcher
    /// callback, this also waits until a delivery already running on
    /// another thread has returned. Called from inside a callback (this
    /// watcher's or another's), it returns without waiting. Safe to call
    /// more than once.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        self.control.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
