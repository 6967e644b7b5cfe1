//! Per-table record store trait.
//!
//! Defines [`RecordStore`], the primary interface the facade and query
//! engine interact with. Orchestrates Layer 1 ([`StorageEngine`](super::StorageEngine))
//! and Layer 3 ([`MapDataStore`](super::MapDataStore)), adding metadata
//! tracking, uniqueness checks, write serialization, and mutation observation.

use std::sync::Arc;

use async_trait::async_trait;

use super::engine::StorageEngine;
use super::record::{Record, RecordValue};
use crate::error::StoreError;

/// Gate serializing every mutation across all tables of one database.
///
/// Held for the whole of a mutation, including the write-through to
/// Layer 3 and the observer fan-out.
pub type WriteGate = Arc<tokio::sync::Mutex<()>>;

/// Row predicate used by [`RecordStore::remove_matching`].
pub type RecordPredicate<'a> = dyn Fn(&Record) -> bool + Send + Sync + 'a;

/// Per-table record store.
///
/// Mutations are serialized by the shared [`WriteGate`]; reads go straight
/// to the engine and never wait for writers.
///
/// Used as `Box<dyn RecordStore>`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Name of the table this record store manages.
    fn name(&self) -> &str;

    // --- Core CRUD ---

    /// Get a record by key. Not-found is `None`.
    fn get(&self, key: &str) -> Option<Record>;

    /// Insert a new row under its own key ([`RecordValue::key`]), assigning
    /// store-generated fields.
    ///
    /// Returns the stored record.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConstraintViolation`] if `key` already exists;
    /// [`StoreError::Backend`] if persistence fails, in which case the
    /// in-memory state is left unchanged.
    async fn insert(&self, value: RecordValue) -> Result<Record, StoreError>;

    /// Remove rows by key. Missing keys are skipped.
    ///
    /// Returns the removed records (empty if none matched).
    async fn remove_keys(&self, keys: &[String]) -> Result<Vec<Record>, StoreError>;

    /// Remove every row matching `predicate`.
    async fn remove_matching(
        &self,
        predicate: &RecordPredicate<'_>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Remove every row. Returns the number of rows removed.
    async fn clear(&self) -> Result<usize, StoreError>;

    // --- Lifecycle ---

    /// Load all persisted rows of this table into memory.
    ///
    /// Returns the number of rows loaded.
    async fn warm_up(&self) -> Result<usize, StoreError>;

    /// Flush pending writes to the backing `MapDataStore`.
    async fn flush(&self) -> Result<(), StoreError>;

    /// Destroy the record store and release all in-memory rows.
    fn destroy(&self);

    /// Access the underlying `StorageEngine` (Layer 1).
    fn storage(&self) -> &dyn StorageEngine;
}
