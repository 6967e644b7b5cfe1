//! Registry of live query subscriptions.
//!
//! Tracks active subscriptions in a `DashMap` keyed by [`SubscriptionId`]
//! and reacts to committed mutations as a [`MutationObserver`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use stuff_core::Watcher;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::subscription::{deliver_loop, DeliveryControl, Subscription, SubscriptionId};
use crate::query::Query;
use crate::storage::{Change, MutationObserver, StorageEngine};

/// Type-erased registry entry for one subscription.
trait LiveQuery: Send + Sync {
    fn table(&self) -> &'static str;

    /// Whether any of `changes` can change the query result.
    fn affected_by(&self, changes: &[Change]) -> bool;

    /// Re-evaluates the query against `view` and queues the result.
    fn refresh(&self, view: &dyn StorageEngine);

    fn cancel(&self);
}

struct LiveSubscription<Q: Query> {
    id: SubscriptionId,
    query: Q,
    results: mpsc::UnboundedSender<Q::Output>,
    control: Arc<DeliveryControl>,
}

impl<Q: Query> LiveQuery for LiveSubscription<Q> {
    fn table(&self) -> &'static str {
        self.query.table()
    }

    fn affected_by(&self, changes: &[Change]) -> bool {
        changes
            .iter()
            .any(|change| self.query.affected_by(&change.record().value))
    }

    fn refresh(&self, view: &dyn StorageEngine) {
        if !self.control.is_active() {
            return;
        }
        let result = self.query.evaluate(view);
        if self.results.send(result).is_err() {
            tracing::debug!(subscription = self.id.0, "delivery task gone, result dropped");
        }
    }

    fn cancel(&self) {
        self.control.cancel();
    }
}

/// Registry of live query subscriptions.
///
/// Registered as a [`MutationObserver`] on every record store of a
/// database. For each committed mutation it refreshes exactly the
/// subscriptions on the mutated table whose query is affected by one of the
/// changed rows. Results are evaluated synchronously (the caller holds the
/// write gate) and delivered asynchronously on `runtime`.
pub struct LiveQueryRegistry {
    subscriptions: DashMap<SubscriptionId, Arc<dyn LiveQuery>>,
    next_id: AtomicU64,
    runtime: Handle,
}

impl LiveQueryRegistry {
    /// Creates an empty registry delivering on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(1),
            runtime,
        }
    }

    /// Registers `watcher` for `query` and queues `initial` as its first result.
    ///
    /// The caller must hold the write gate so that no mutation commits
    /// between evaluating `initial` and the subscription becoming visible.
    pub(crate) fn register<Q, W>(
        self: &Arc<Self>,
        query: Q,
        initial: Q::Output,
        watcher: W,
    ) -> Subscription
    where
        Q: Query,
        W: Watcher<Q::Output>,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let table = query.table();
        let (tx, rx) = mpsc::unbounded_channel();
        let control = Arc::new(DeliveryControl::new());

        // Receiver is alive; this cannot fail.
        let _ = tx.send(initial);
        self.runtime.spawn(deliver_loop(
            id,
            rx,
            Box::new(watcher),
            Arc::clone(&control),
        ));

        let entry = LiveSubscription {
            id,
            query,
            results: tx,
            control: Arc::clone(&control),
        };
        self.subscriptions.insert(id, Arc::new(entry));
        tracing::debug!(subscription = id.0, table, "live query registered");

        Subscription::new(id, Arc::downgrade(self), control)
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    ///
    /// Does not wait for an in-flight delivery; use
    /// [`Subscription::unsubscribe`] for that.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.remove(&id).is_some();
        if removed {
            tracing::debug!(subscription = id.0, "live query removed");
        }
        removed
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Cancels and removes every subscription.
    pub fn shutdown(&self) {
        let cancelled = self.drain(|_| true);
        if cancelled > 0 {
            tracing::debug!(cancelled, "live queries cancelled");
        }
    }

    /// Removes and cancels the subscriptions matching `filter`.
    fn drain(&self, filter: impl Fn(&dyn LiveQuery) -> bool) -> usize {
        // Collect first: cancelling waits on delivery locks and must not
        // run while holding DashMap shard guards.
        let ids: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|entry| filter(entry.value().as_ref()))
            .map(|entry| *entry.key())
            .collect();

        let mut cancelled = 0;
        for id in ids {
            if let Some((_, subscription)) = self.subscriptions.remove(&id) {
                subscription.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}

impl MutationObserver for LiveQueryRegistry {
    fn on_commit(&self, table: &str, changes: &[Change], view: &dyn StorageEngine) {
        let affected: Vec<Arc<dyn LiveQuery>> = self
            .subscriptions
            .iter()
            .filter(|entry| entry.value().table() == table && entry.value().affected_by(changes))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for subscription in &affected {
            subscription.refresh(view);
        }

        if !affected.is_empty() {
            tracing::debug!(table = %table, refreshed = affected.len(), "live queries refreshed");
        }
    }

    fn on_load(&self, table: &str, count: usize) {
        tracing::trace!(table = %table, rows = count, "table loaded before any subscription");
    }

    fn on_destroy(&self, table: &str) {
        let cancelled = self.drain(|subscription| subscription.table() == table);
        if cancelled > 0 {
            tracing::debug!(table = %table, cancelled, "live queries cancelled on destroy");
        }
    }
}
