//! No-op [`MapDataStore`] implementation.
//!
//! [`NullDataStore`] discards all writes and returns empty results for reads.
//! Backs ephemeral (in-memory) databases, whose rows live only in the
//! [`RecordStore`](crate::storage::RecordStore).

use async_trait::async_trait;

use crate::storage::map_data_store::MapDataStore;
use crate::storage::record::RecordValue;

/// No-op `MapDataStore` for ephemeral databases.
///
/// All write operations succeed immediately without side effects.
/// All read operations return empty results.
pub struct NullDataStore;

#[async_trait]
impl MapDataStore for NullDataStore {
    async fn add(&self, _table: &str, _key: &str, _value: &RecordValue) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_all(&self, _table: &str, _keys: &[String]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn load_all_entries(&self, _table: &str) -> anyhow::Result<Vec<(String, RecordValue)>> {
        Ok(Vec::new())
    }

    async fn hard_flush(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_null(&self) -> bool {
        true
    }
}
