//! Live queries: push recomputed query results to watchers after mutations.
//!
//! [`LiveQueryRegistry`] is a [`MutationObserver`](crate::storage::MutationObserver).
//! On every committed mutation it re-evaluates the affected subscriptions
//! against the post-mutation state and queues the result; a per-subscription
//! task on the notification runtime hands results to the watcher in order.
//! [`Subscription`] is the handle used to cancel delivery.

mod registry;
mod subscription;

pub use registry::LiveQueryRegistry;
pub use subscription::{Subscription, SubscriptionId};
