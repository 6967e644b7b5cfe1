//! Errors surfaced by the public store API.

/// Errors returned by [`StuffStore`](crate::StuffStore) and
/// [`Database`](crate::Database) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row with the same key already exists. Retrying the same insert
    /// will fail the same way.
    #[error("constraint violation: key {key:?} already exists in table {table}")]
    ConstraintViolation { table: String, key: String },
    /// The database has been closed.
    #[error("database is closed")]
    Closed,
    /// Durable storage was requested but the crate was built without it.
    #[error("durable storage requested but the `redb` feature is disabled")]
    DurableStorageUnavailable,
    /// No record store is registered for the table.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// Persistence or codec failure in a lower storage layer.
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether this error is a uniqueness violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}
