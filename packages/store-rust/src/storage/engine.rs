//! Low-level storage engine trait.
//!
//! Defines [`StorageEngine`], the innermost storage layer. Implementations
//! provide in-memory key-value storage for one table.

use super::record::Record;

/// Low-level key-value storage for the rows of one table.
///
/// Innermost storage layer. All operations are synchronous; implementations
/// must allow concurrent readers while a writer is active, and each
/// single-key write must be visible atomically.
///
/// Query evaluation reads through `&dyn StorageEngine`.
pub trait StorageEngine: Send + Sync + 'static {
    /// Insert or replace a record by key. Returns the previous record if any.
    fn put(&self, key: &str, record: Record) -> Option<Record>;

    /// Retrieve a record by key, or `None` if not present.
    fn get(&self, key: &str) -> Option<Record>;

    /// Remove a record by key, returning the removed record.
    fn remove(&self, key: &str) -> Option<Record>;

    /// Check if a key exists without returning the record.
    fn contains_key(&self, key: &str) -> bool;

    /// Return the number of entries.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries. Takes `&self` for shared-reference compatibility.
    fn clear(&self);

    /// Destroy the storage, releasing all resources. Takes `&self`.
    fn destroy(&self);

    /// Return a point-in-time copy of all entries.
    ///
    /// The snapshot is mutation-tolerant (concurrent modifications do not fail).
    fn snapshot_iter(&self) -> Vec<(String, Record)>;
}
