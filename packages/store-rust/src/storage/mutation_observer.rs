//! Mutation observer trait and composite implementation.
//!
//! Defines [`MutationObserver`] for reacting to committed mutations within a
//! [`RecordStore`](super::RecordStore), and [`CompositeMutationObserver`]
//! which fans out notifications to multiple observers.

use std::sync::Arc;

use super::engine::StorageEngine;
use super::record::Record;

/// One row-level change inside a committed mutation.
#[derive(Debug, Clone)]
pub enum Change {
    /// A row was inserted.
    Inserted { key: String, record: Record },
    /// A row was removed.
    Removed { key: String, record: Record },
}

impl Change {
    /// Key of the changed row.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Inserted { key, .. } | Self::Removed { key, .. } => key,
        }
    }

    /// The inserted row, or the row as it was before removal.
    #[must_use]
    pub fn record(&self) -> &Record {
        match self {
            Self::Inserted { record, .. } | Self::Removed { record, .. } => record,
        }
    }

    /// Consumes the change, returning its record.
    #[must_use]
    pub fn into_record(self) -> Record {
        match self {
            Self::Inserted { record, .. } | Self::Removed { record, .. } => record,
        }
    }
}

/// Observer for committed mutations within a `RecordStore`.
///
/// Called synchronously while the record store still holds the write gate:
/// `view` reflects exactly the state after this mutation and no other writer
/// can change it until the call returns. Implementations must not block.
///
/// Used as `Arc<dyn MutationObserver>`.
pub trait MutationObserver: Send + Sync {
    /// Called once per committed mutation (an insert, a delete call, or a
    /// clear) with every row it changed. Never called with an empty slice.
    fn on_commit(&self, table: &str, changes: &[Change], view: &dyn StorageEngine);

    /// Called after persisted rows are loaded into memory at open.
    fn on_load(&self, table: &str, count: usize);

    /// Called when the record store is destroyed.
    fn on_destroy(&self, table: &str);
}

/// Fan-out observer that delegates to multiple [`MutationObserver`] instances.
///
/// Iterates all registered observers for each notification method,
/// enabling multiple independent reactions to a single mutation.
#[derive(Default)]
pub struct CompositeMutationObserver {
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl CompositeMutationObserver {
    /// Creates a composite observer with the given list of observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn MutationObserver>>) -> Self {
        Self { observers }
    }
}

impl MutationObserver for CompositeMutationObserver {
    fn on_commit(&self, table: &str, changes: &[Change], view: &dyn StorageEngine) {
        for observer in &self.observers {
            observer.on_commit(table, changes, view);
        }
    }

    fn on_load(&self, table: &str, count: usize) {
        for observer in &self.observers {
            observer.on_load(table, count);
        }
    }

    fn on_destroy(&self, table: &str) {
        for observer in &self.observers {
            observer.on_destroy(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use stuff_core::VersionedThingy;

    use super::*;
    use crate::storage::engines::HashMapStorage;
    use crate::storage::record::{RecordMetadata, RecordValue};

    /// Appends `"<name>:<event>"` to a shared log on every callback.
    struct LoggingObserver {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MutationObserver for LoggingObserver {
        fn on_commit(&self, table: &str, changes: &[Change], view: &dyn StorageEngine) {
            let keys: Vec<&str> = changes.iter().map(Change::key).collect();
            self.log.lock().push(format!(
                "{}:commit {table} [{}] rows={}",
                self.name,
                keys.join(","),
                view.len()
            ));
        }
        fn on_load(&self, table: &str, count: usize) {
            self.log.lock().push(format!("{}:load {table} {count}", self.name));
        }
        fn on_destroy(&self, table: &str) {
            self.log.lock().push(format!("{}:destroy {table}", self.name));
        }
    }

    fn inserted(version_code: i32) -> Change {
        let thingy = VersionedThingy::with_version("t", version_code);
        Change::Inserted {
            key: thingy.key(),
            record: Record {
                value: RecordValue::from(thingy),
                metadata: RecordMetadata::new(1_000_000),
            },
        }
    }

    #[test]
    fn removed_change_keeps_the_old_row() {
        let before = inserted(3);
        let removed = Change::Removed {
            key: before.key().to_string(),
            record: before.record().clone(),
        };

        assert_eq!(removed.key(), "3:t");
        let row = removed.into_record();
        assert_eq!(row.value.as_thingy().unwrap().version_code(), 3);
    }

    #[test]
    fn observers_run_in_registration_order_with_the_whole_commit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observer = |name| {
            Arc::new(LoggingObserver {
                name,
                log: Arc::clone(&log),
            }) as Arc<dyn MutationObserver>
        };
        let composite = CompositeMutationObserver::new(vec![observer("first"), observer("second")]);
        let view = HashMapStorage::new();
        view.put("1:t", inserted(1).into_record());

        composite.on_commit("versioned_thingy", &[inserted(1), inserted(2)], &view);
        composite.on_load("customer", 4);
        composite.on_destroy("customer");

        assert_eq!(
            *log.lock(),
            vec![
                "first:commit versioned_thingy [1:t,2:t] rows=1",
                "second:commit versioned_thingy [1:t,2:t] rows=1",
                "first:load customer 4",
                "second:load customer 4",
                "first:destroy customer",
                "second:destroy customer",
            ]
        );
    }

    #[test]
    fn composite_without_observers_accepts_every_event() {
        let composite = CompositeMutationObserver::default();
        composite.on_commit("versioned_thingy", &[inserted(1)], &HashMapStorage::new());
        composite.on_load("versioned_thingy", 0);
        composite.on_destroy("versioned_thingy");
    }
}
