//! Stuff store: a typed local record store with live queries.
//!
//! Holds versioned thingies and customers in memory, optionally backed by a
//! redb file, and pushes recomputed query results to watchers after every
//! relevant mutation.

pub mod config;
pub mod database;
pub mod error;
pub mod live;
pub mod logging;
pub mod query;
pub mod storage;

pub use config::DatabaseConfig;
pub use database::{Database, DatabaseState, StuffStore};
pub use error::StoreError;
pub use live::{Subscription, SubscriptionId};
pub use query::Query;
