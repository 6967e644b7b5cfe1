//! Per-table record store that orchestrates the storage layers.
//!
//! [`DefaultRecordStore`] is the Layer 2 component in the storage hierarchy.
//! It coordinates the in-memory [`StorageEngine`](crate::storage::StorageEngine)
//! (Layer 1) with the [`MapDataStore`](crate::storage::MapDataStore) (Layer 3),
//! enforcing key uniqueness and firing mutation observers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::storage::engine::StorageEngine;
use crate::storage::map_data_store::MapDataStore;
use crate::storage::mutation_observer::{Change, CompositeMutationObserver, MutationObserver};
use crate::storage::record::{Record, RecordMetadata, RecordValue};
use crate::storage::record_store::{RecordPredicate, RecordStore, WriteGate};

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
///
/// Millisecond timestamps fit comfortably in i64 until the year 292 million.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Per-table record store that orchestrates the storage layers.
///
/// Coordinates:
/// - Layer 1 ([`StorageEngine`]): in-memory key-value storage
/// - Layer 3 ([`MapDataStore`]): external persistence backend
/// - [`CompositeMutationObserver`]: mutation notification fan-out
///
/// Every mutation runs under the shared [`WriteGate`] in the order:
/// persist to Layer 3, apply to Layer 1, notify observers. A failed
/// persist therefore leaves memory untouched and notifies nobody.
/// Once [`destroy`](RecordStore::destroy) has run, mutations fail with
/// [`StoreError::Closed`].
pub struct DefaultRecordStore {
    name: String,
    engine: Box<dyn StorageEngine>,
    data_store: Arc<dyn MapDataStore>,
    observer: Arc<CompositeMutationObserver>,
    gate: WriteGate,
    destroyed: AtomicBool,
}

impl DefaultRecordStore {
    /// Creates a new `DefaultRecordStore` with the given dependencies.
    #[must_use]
    pub fn new(
        name: String,
        engine: Box<dyn StorageEngine>,
        data_store: Arc<dyn MapDataStore>,
        observer: Arc<CompositeMutationObserver>,
        gate: WriteGate,
    ) -> Self {
        Self {
            name,
            engine,
            data_store,
            observer,
            gate,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Rejects mutations after destroy. Caller must hold the write gate.
    fn ensure_live(&self) -> Result<(), StoreError> {
        if self.destroyed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Removes the given keys. Caller must hold the write gate.
    async fn remove_locked(&self, keys: Vec<String>) -> Result<Vec<Record>, StoreError> {
        self.ensure_live()?;
        let mut present: Vec<String> = keys
            .into_iter()
            .filter(|key| self.engine.contains_key(key))
            .collect();
        present.sort_unstable();
        present.dedup();

        if present.is_empty() {
            return Ok(Vec::new());
        }

        self.data_store.remove_all(&self.name, &present).await?;

        let changes: Vec<Change> = present
            .into_iter()
            .filter_map(|key| {
                self.engine
                    .remove(&key)
                    .map(|record| Change::Removed { key, record })
            })
            .collect();

        tracing::debug!(table = %self.name, removed = changes.len(), "records removed");
        if !changes.is_empty() {
            self.observer.on_commit(&self.name, &changes, &*self.engine);
        }

        Ok(changes.into_iter().map(Change::into_record).collect())
    }
}

#[async_trait]
impl RecordStore for DefaultRecordStore {
    fn name(&self) -> &str {
        &self.name
    }

    // --- Core CRUD ---

    fn get(&self, key: &str) -> Option<Record> {
        self.engine.get(key)
    }

    async fn insert(&self, mut value: RecordValue) -> Result<Record, StoreError> {
        debug_assert_eq!(value.table(), self.name, "row inserted into the wrong table");
        let key = value.key();
        let _gate = self.gate.lock().await;
        self.ensure_live()?;

        // Step 1: Uniqueness check
        if self.engine.contains_key(&key) {
            return Err(StoreError::ConstraintViolation {
                table: self.name.clone(),
                key,
            });
        }

        // Step 2: Store-generated fields
        let now = now_millis();
        value.stamp_created(now);
        let record = Record {
            value,
            metadata: RecordMetadata::new(now),
        };

        // Step 3: Write-through
        if let Err(err) = self.data_store.add(&self.name, &key, &record.value).await {
            tracing::warn!(table = %self.name, key = %key, error = %err, "insert not persisted");
            return Err(err.into());
        }

        // Step 4: Apply in memory
        self.engine.put(&key, record.clone());
        tracing::debug!(table = %self.name, key = %key, "record inserted");

        // Step 5: Fire observers against the post-insert state
        let changes = [Change::Inserted {
            key,
            record: record.clone(),
        }];
        self.observer.on_commit(&self.name, &changes, &*self.engine);

        Ok(record)
    }

    async fn remove_keys(&self, keys: &[String]) -> Result<Vec<Record>, StoreError> {
        let _gate = self.gate.lock().await;
        self.remove_locked(keys.to_vec()).await
    }

    async fn remove_matching(
        &self,
        predicate: &RecordPredicate<'_>,
    ) -> Result<Vec<Record>, StoreError> {
        let _gate = self.gate.lock().await;
        let keys = self
            .engine
            .snapshot_iter()
            .into_iter()
            .filter(|(_, record)| predicate(record))
            .map(|(key, _)| key)
            .collect();
        self.remove_locked(keys).await
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let _gate = self.gate.lock().await;
        let keys = self
            .engine
            .snapshot_iter()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        Ok(self.remove_locked(keys).await?.len())
    }

    // --- Lifecycle ---

    async fn warm_up(&self) -> Result<usize, StoreError> {
        if self.data_store.is_null() {
            return Ok(0);
        }

        let _gate = self.gate.lock().await;
        self.ensure_live()?;
        let entries = self.data_store.load_all_entries(&self.name).await?;
        let now = now_millis();
        let count = entries.len();
        for (key, value) in entries {
            let metadata = RecordMetadata::new(now);
            self.engine.put(&key, Record { value, metadata });
        }

        tracing::info!(table = %self.name, rows = count, "table loaded");
        self.observer.on_load(&self.name, count);
        Ok(count)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        Ok(self.data_store.hard_flush().await?)
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.observer.on_destroy(&self.name);
        self.engine.destroy();
    }

    fn storage(&self) -> &dyn StorageEngine {
        &*self.engine
    }
}
