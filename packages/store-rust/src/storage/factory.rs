//! Factory for creating fully-wired [`RecordStore`] instances.
//!
//! [`RecordStoreFactory`] is the wiring point that creates
//! [`DefaultRecordStore`] instances with all layers connected:
//! [`HashMapStorage`] (Layer 1), a shared [`MapDataStore`] (Layer 3),
//! a [`CompositeMutationObserver`] assembled from registered observers,
//! and the database-wide [`WriteGate`].

use std::sync::Arc;

use crate::storage::engines::HashMapStorage;
use crate::storage::impls::DefaultRecordStore;
use crate::storage::map_data_store::MapDataStore;
use crate::storage::mutation_observer::{CompositeMutationObserver, MutationObserver};
use crate::storage::record_store::{RecordStore, WriteGate};

/// Factory for creating fully-wired [`RecordStore`] instances.
///
/// Holds the persistence backend, the observer list, and the write gate.
/// Every store created by one factory shares that gate, so all tables of a
/// database are written by a single writer at a time.
pub struct RecordStoreFactory {
    data_store: Arc<dyn MapDataStore>,
    observers: Vec<Arc<dyn MutationObserver>>,
    gate: WriteGate,
}

impl RecordStoreFactory {
    /// Creates a new factory with a fresh write gate.
    #[must_use]
    pub fn new(
        data_store: Arc<dyn MapDataStore>,
        observers: Vec<Arc<dyn MutationObserver>>,
    ) -> Self {
        Self {
            data_store,
            observers,
            gate: WriteGate::default(),
        }
    }

    /// The write gate shared by every store this factory creates.
    #[must_use]
    pub fn write_gate(&self) -> WriteGate {
        Arc::clone(&self.gate)
    }

    /// Creates a [`RecordStore`] for the given table.
    ///
    /// Assembles a fresh [`HashMapStorage`] engine, clones the shared
    /// [`MapDataStore`] reference, and builds a [`CompositeMutationObserver`]
    /// from the registered observer list.
    #[must_use]
    pub fn create(&self, table: &str) -> Box<dyn RecordStore> {
        let engine = Box::new(HashMapStorage::new());
        let observer = Arc::new(CompositeMutationObserver::new(self.observers.clone()));
        let record_store = DefaultRecordStore::new(
            table.to_string(),
            engine,
            Arc::clone(&self.data_store),
            observer,
            Arc::clone(&self.gate),
        );
        Box::new(record_store)
    }
}

#[cfg(test)]
mod tests {
    use stuff_core::{VersionedThingy, CUSTOMER_TABLE, VERSIONED_THINGY_TABLE};

    use super::*;
    use crate::storage::datastores::NullDataStore;
    use crate::storage::record::RecordValue;

    fn make_factory() -> RecordStoreFactory {
        RecordStoreFactory::new(Arc::new(NullDataStore), Vec::new())
    }

    #[tokio::test]
    async fn factory_create_returns_working_record_store() {
        let factory = make_factory();

        let store = factory.create(VERSIONED_THINGY_TABLE);
        assert_eq!(store.name(), VERSIONED_THINGY_TABLE);

        store
            .insert(RecordValue::from(VersionedThingy::with_version("a", 1)))
            .await
            .unwrap();

        assert!(store.get("1:a").is_some());
        assert_eq!(store.storage().len(), 1);
    }

    #[tokio::test]
    async fn factory_creates_independent_stores() {
        let factory = make_factory();

        let thingies = factory.create(VERSIONED_THINGY_TABLE);
        let customers = factory.create(CUSTOMER_TABLE);

        thingies
            .insert(RecordValue::from(VersionedThingy::with_version("a", 1)))
            .await
            .unwrap();

        assert_eq!(thingies.storage().len(), 1);
        assert!(customers.storage().is_empty(), "stores should be independent");
    }

    #[tokio::test]
    async fn stores_share_the_factory_gate() {
        let factory = make_factory();
        let thingies = factory.create(VERSIONED_THINGY_TABLE);
        let customers = factory.create(CUSTOMER_TABLE);
        let gate = factory.write_gate();

        let guard = gate.lock().await;
        let wait = std::time::Duration::from_millis(50);
        let clear_thingies = tokio::time::timeout(wait, thingies.clear()).await;
        let clear_customers = tokio::time::timeout(wait, customers.clear()).await;
        assert!(clear_thingies.is_err() && clear_customers.is_err());

        drop(guard);
        assert_eq!(customers.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn held_gate_blocks_writers_on_every_table() {
        let factory = make_factory();
        let store = factory.create(VERSIONED_THINGY_TABLE);
        let gate = factory.write_gate();

        let guard = gate.lock().await;
        let insert = store.insert(RecordValue::from(VersionedThingy::with_version("a", 1)));
        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(50), insert).await;
        assert!(blocked.is_err(), "insert must wait for the gate");

        drop(guard);
        store
            .insert(RecordValue::from(VersionedThingy::with_version("a", 1)))
            .await
            .unwrap();
    }
}
