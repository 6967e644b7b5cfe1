//! Durable [`MapDataStore`] backed by a single redb file.
//!
//! Each entity table maps to a redb table of `&str -> &[u8]`, values encoded
//! with [`stuff_core::codec`]. redb is synchronous, so every transaction runs
//! on the blocking thread pool.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition, TableError};
use stuff_core::codec::{decode_row, encode_row};

use crate::storage::map_data_store::MapDataStore;
use crate::storage::record::RecordValue;

fn table_def(table: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(table)
}

/// Write-through persistence into a redb database file.
///
/// Every `add()` / `remove_all()` is one committed write transaction, so
/// nothing is pending when a call returns.
pub struct RedbDataStore {
    db: Arc<Database>,
}

impl RedbDataStore {
    /// Opens the database file at `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, is locked by another
    /// process, or is not a redb database.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let db = Database::create(path)
            .with_context(|| format!("opening redb database {}", path.display()))?;
        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl MapDataStore for RedbDataStore {
    async fn add(&self, table: &str, key: &str, value: &RecordValue) -> anyhow::Result<()> {
        let db = Arc::clone(&self.db);
        let table = table.to_string();
        let key = key.to_string();
        let bytes = encode_row(value)?;

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let txn = db.begin_write()?;
            {
                let mut rows = txn.open_table(table_def(&table))?;
                rows.insert(key.as_str(), bytes.as_slice())?;
            }
            txn.commit()?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn remove_all(&self, table: &str, keys: &[String]) -> anyhow::Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let db = Arc::clone(&self.db);
        let table = table.to_string();
        let keys = keys.to_vec();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let txn = db.begin_write()?;
            {
                let mut rows = txn.open_table(table_def(&table))?;
                for key in &keys {
                    rows.remove(key.as_str())?;
                }
            }
            txn.commit()?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn load_all_entries(&self, table: &str) -> anyhow::Result<Vec<(String, RecordValue)>> {
        let db = Arc::clone(&self.db);
        let table = table.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<(String, RecordValue)>> {
            let txn = db.begin_read()?;
            let rows = match txn.open_table(table_def(&table)) {
                Ok(rows) => rows,
                Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
                Err(err) => return Err(err.into()),
            };

            let mut entries = Vec::new();
            for entry in rows.iter()? {
                let (key, value) = entry?;
                let decoded: RecordValue = decode_row(value.value())
                    .with_context(|| format!("decoding row {} of table {table}", key.value()))?;
                entries.push((key.value().to_string(), decoded));
            }
            Ok(entries)
        })
        .await?
    }

    async fn hard_flush(&self) -> anyhow::Result<()> {
        // Every write is already a committed transaction.
        Ok(())
    }
}
