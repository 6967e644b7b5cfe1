//! `MapDataStore` implementations.
//!
//! Provides concrete backends for the [`MapDataStore`](super::MapDataStore) trait:
//! [`NullDataStore`] for ephemeral databases and, with the `redb` feature,
//! [`RedbDataStore`] for durable ones.

mod null;
#[cfg(feature = "redb")]
mod redb_store;

pub use null::NullDataStore;
#[cfg(feature = "redb")]
pub use redb_store::RedbDataStore;
