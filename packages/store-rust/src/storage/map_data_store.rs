//! External persistence backend trait for the storage layer.
//!
//! Defines [`MapDataStore`], the Layer 3 abstraction over durable storage.
//! The [`RecordStore`](super::RecordStore) calls `add()` / `remove_all()` on
//! every mutation and `load_all_entries()` once when a table is opened.

use async_trait::async_trait;

use super::record::RecordValue;

/// External persistence backend for a `RecordStore`.
///
/// Writes are write-through: when `add()` or `remove_all()` returns `Ok`,
/// the change is durable. The in-memory layer is rolled back if they fail.
///
/// Used as `Arc<dyn MapDataStore>`.
#[async_trait]
pub trait MapDataStore: Send + Sync {
    /// Persist a row.
    async fn add(&self, table: &str, key: &str, value: &RecordValue) -> anyhow::Result<()>;

    /// Remove rows by key. Missing keys are ignored.
    async fn remove_all(&self, table: &str, keys: &[String]) -> anyhow::Result<()>;

    /// Load every persisted row of a table.
    ///
    /// A table that was never written returns an empty list.
    async fn load_all_entries(&self, table: &str) -> anyhow::Result<Vec<(String, RecordValue)>>;

    /// Flush pending writes. Called on close.
    async fn hard_flush(&self) -> anyhow::Result<()>;

    /// Whether this is a null (no-op) implementation.
    ///
    /// Returns `false` by default. Null implementations override to return `true`.
    fn is_null(&self) -> bool {
        false
    }
}
