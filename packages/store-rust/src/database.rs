//! Database session and the typed `StuffStore` facade.
//!
//! [`Database::open`] wires the storage layers for both tables, loads
//! persisted rows, and registers the live query notifier. [`StuffStore`] is
//! the cheap-to-clone handle callers use for reads, writes, and
//! subscriptions.

use std::sync::Arc;

use anyhow::Context as _;
use arc_swap::ArcSwap;
use stuff_core::{
    Customer, CustomerDisplayTuple, CustomerStats, VersionedThingy, Watcher, CUSTOMER_TABLE,
    VERSIONED_THINGY_TABLE,
};
use tokio::runtime::Handle;

use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::live::{LiveQueryRegistry, Subscription};
use crate::query::{
    CustomerCount, CustomerStatsQuery, CustomersByPostalCode, DisplayTuplesByPostalCode,
    PostalCodeFilter, Query, ThingyVersions,
};
use crate::storage::datastores::NullDataStore;
use crate::storage::{
    MapDataStore, MutationObserver, Record, RecordStore, RecordStoreFactory, WriteGate,
};

/// Database lifecycle state.
///
/// State machine: Open -> Closing -> Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    /// Accepting reads, writes, and subscriptions.
    Open,
    /// `close()` is waiting for in-flight writes and flushing.
    Closing,
    /// Every operation fails with [`StoreError::Closed`].
    Closed,
}

struct Inner {
    config: DatabaseConfig,
    state: ArcSwap<DatabaseState>,
    thingies: Box<dyn RecordStore>,
    customers: Box<dyn RecordStore>,
    registry: Arc<LiveQueryRegistry>,
    gate: WriteGate,
}

impl Inner {
    fn state(&self) -> DatabaseState {
        **self.state.load()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        match self.state() {
            DatabaseState::Open => Ok(()),
            DatabaseState::Closing | DatabaseState::Closed => Err(StoreError::Closed),
        }
    }

    fn table(&self, name: &str) -> Result<&dyn RecordStore, StoreError> {
        match name {
            VERSIONED_THINGY_TABLE => Ok(&*self.thingies),
            CUSTOMER_TABLE => Ok(&*self.customers),
            other => Err(StoreError::UnknownTable(other.to_string())),
        }
    }

    /// Moves `Open -> Closing`. Returns `false` if another caller got there first.
    fn begin_closing(&self) -> bool {
        let previous = self.state.rcu(|state| {
            if **state == DatabaseState::Open {
                Arc::new(DatabaseState::Closing)
            } else {
                Arc::clone(state)
            }
        });
        *previous == DatabaseState::Open
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.begin_closing() {
            return Ok(());
        }

        // Writers already queued on the gate finish first.
        let _gate = self.gate.lock().await;
        self.registry.shutdown();
        let flushed = match self.thingies.flush().await {
            Ok(()) => self.customers.flush().await,
            Err(err) => Err(err),
        };
        self.thingies.destroy();
        self.customers.destroy();
        self.state.store(Arc::new(DatabaseState::Closed));

        match &flushed {
            Ok(()) => tracing::info!(path = %self.config.path.display(), "database closed"),
            Err(err) => tracing::warn!(error = %err, "database closed with flush failure"),
        }
        flushed
    }

    /// Synchronous release for the drop path.
    ///
    /// Rows are freed with the last `StuffStore` handle; redb commits are
    /// already durable, so nothing needs flushing here.
    fn release(&self) {
        if self.begin_closing() {
            self.registry.shutdown();
            self.state.store(Arc::new(DatabaseState::Closed));
            tracing::debug!("database dropped without close");
        }
    }
}

async fn open_data_store(config: &DatabaseConfig) -> Result<Arc<dyn MapDataStore>, StoreError> {
    if config.in_memory {
        return Ok(Arc::new(NullDataStore));
    }

    #[cfg(feature = "redb")]
    {
        let path = config.path.clone();
        let store = tokio::task::spawn_blocking(move || {
            crate::storage::datastores::RedbDataStore::open(&path)
        })
        .await
        .context("redb open task failed")??;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redb"))]
    {
        Err(StoreError::DurableStorageUnavailable)
    }
}

/// An open database holding the versioned-thingy and customer tables.
///
/// Call [`close`](Self::close) for an orderly shutdown. Dropping the
/// database without closing still cancels every subscription, and
/// operations on outstanding [`StuffStore`] handles then fail with
/// [`StoreError::Closed`].
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    /// Opens the database described by `config`.
    ///
    /// Must be called from within a tokio runtime; watcher deliveries run
    /// on that runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DurableStorageUnavailable`] if durable storage
    /// is requested without the `redb` feature, and [`StoreError::Backend`]
    /// if there is no runtime or the database file cannot be opened or read.
    pub async fn open(config: DatabaseConfig) -> Result<Self, StoreError> {
        let runtime = Handle::try_current().context("Database::open requires a tokio runtime")?;
        let data_store = open_data_store(&config).await?;
        let registry = Arc::new(LiveQueryRegistry::new(runtime));

        let factory = RecordStoreFactory::new(
            data_store,
            vec![Arc::clone(&registry) as Arc<dyn MutationObserver>],
        );
        let thingies = factory.create(VERSIONED_THINGY_TABLE);
        let customers = factory.create(CUSTOMER_TABLE);
        let loaded = thingies.warm_up().await? + customers.warm_up().await?;

        tracing::info!(
            path = %config.path.display(),
            in_memory = config.in_memory,
            rows = loaded,
            "database opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                gate: factory.write_gate(),
                config,
                state: ArcSwap::from_pointee(DatabaseState::Open),
                thingies,
                customers,
                registry,
            }),
        })
    }

    /// Returns a handle for reads, writes, and subscriptions.
    #[must_use]
    pub fn store(&self) -> StuffStore {
        StuffStore {
            inner: Arc::clone(&self.inner),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn state(&self) -> DatabaseState {
        self.inner.state()
    }

    /// Waits for in-flight writes, cancels all subscriptions, flushes the
    /// backend, and releases the in-memory tables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the final flush fails. The
    /// database is closed either way.
    pub async fn close(self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// Typed access to the tables of an open [`Database`].
///
/// Writes wait for the database-wide write gate and return once the row is
/// persisted and visible. Reads never wait for writers.
#[derive(Clone)]
pub struct StuffStore {
    inner: Arc<Inner>,
}

impl StuffStore {
    // --- Versioned thingies ---

    /// Inserts one version of a thingy.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConstraintViolation`] if `(id, version_code)` exists.
    pub async fn insert_thingy(
        &self,
        thingy: VersionedThingy,
    ) -> Result<VersionedThingy, StoreError> {
        self.inner.ensure_open()?;
        let record = self.inner.thingies.insert(thingy.into()).await?;
        record
            .value
            .into_thingy()
            .ok_or_else(|| wrong_row(VERSIONED_THINGY_TABLE))
    }

    /// Looks up one version of a thingy.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn find_thingy(
        &self,
        id: &str,
        version_code: i32,
    ) -> Result<Option<VersionedThingy>, StoreError> {
        self.inner.ensure_open()?;
        let key = VersionedThingy::storage_key(id, version_code);
        Ok(self
            .inner
            .thingies
            .get(&key)
            .and_then(|record| record.value.into_thingy()))
    }

    /// Every stored version of `id`, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn find_thingy_versions(&self, id: &str) -> Result<Vec<VersionedThingy>, StoreError> {
        self.query(&ThingyVersions::new(id))
    }

    /// Deletes every version of `id`, returning how many rows were removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if the removal cannot be persisted.
    pub async fn delete_thingy(&self, id: &str) -> Result<usize, StoreError> {
        self.inner.ensure_open()?;
        let removed = self
            .inner
            .thingies
            .remove_matching(&|record: &Record| {
                record.value.as_thingy().is_some_and(|thingy| thingy.id() == id)
            })
            .await?;
        Ok(removed.len())
    }

    // --- Customers ---

    /// Inserts a customer and returns it with its creation date assigned.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConstraintViolation`] if the id exists.
    pub async fn insert_customer(&self, customer: Customer) -> Result<Customer, StoreError> {
        self.inner.ensure_open()?;
        let record = self.inner.customers.insert(customer.into()).await?;
        record
            .value
            .into_customer()
            .ok_or_else(|| wrong_row(CUSTOMER_TABLE))
    }

    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn find_customer(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        self.inner.ensure_open()?;
        Ok(self
            .inner
            .customers
            .get(id)
            .and_then(|record| record.value.into_customer()))
    }

    /// Customers whose postal code is one of `codes`, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn find_by_postal_codes<I, S>(
        &self,
        limit: usize,
        codes: I,
    ) -> Result<Vec<Customer>, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query(&CustomersByPostalCode(PostalCodeFilter::new(limit, codes)))
    }

    /// Like [`find_by_postal_codes`](Self::find_by_postal_codes), projected
    /// to `(id, display_name)`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn load_display_tuples_by_postal_codes<I, S>(
        &self,
        limit: usize,
        codes: I,
    ) -> Result<Vec<CustomerDisplayTuple>, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query(&DisplayTuplesByPostalCode(PostalCodeFilter::new(
            limit, codes,
        )))
    }

    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn customer_count(&self) -> Result<usize, StoreError> {
        self.query(&CustomerCount)
    }

    /// Count and maximum postal code over all customers.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn customer_stats(&self) -> Result<CustomerStats, StoreError> {
        self.query(&CustomerStatsQuery)
    }

    /// Deletes the customers with the given ids in one mutation.
    ///
    /// Returns how many rows were removed; unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if the removal cannot be persisted.
    pub async fn nuke_customers<S>(&self, ids: &[S]) -> Result<usize, StoreError>
    where
        S: AsRef<str> + Sync,
    {
        self.inner.ensure_open()?;
        let keys: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
        let removed = self.inner.customers.remove_keys(&keys).await?;
        Ok(removed.len())
    }

    // --- Queries and subscriptions ---

    /// Evaluates `query` once against the current rows.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub fn query<Q: Query>(&self, query: &Q) -> Result<Q::Output, StoreError> {
        self.inner.ensure_open()?;
        let store = self.inner.table(query.table())?;
        Ok(query.evaluate(store.storage()))
    }

    /// Subscribes `watcher` to the results of `query`.
    ///
    /// The watcher first receives the current result, then a recomputed
    /// result after every committed mutation that can change it. Delivery
    /// continues until the returned [`Subscription`] is unsubscribed or
    /// dropped, or the database closes.
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub async fn observe<Q, W>(&self, query: Q, watcher: W) -> Result<Subscription, StoreError>
    where
        Q: Query,
        W: Watcher<Q::Output>,
    {
        self.inner.ensure_open()?;
        let store = self.inner.table(query.table())?;

        let _gate = self.inner.gate.lock().await;
        self.inner.ensure_open()?;
        let initial = query.evaluate(store.storage());
        Ok(self.inner.registry.register(query, initial, watcher))
    }

    /// Live form of [`find_by_postal_codes`](Self::find_by_postal_codes).
    ///
    /// # Errors
    ///
    /// [`StoreError::Closed`] after close.
    pub async fn observe_by_postal_codes<W>(
        &self,
        limit: usize,
        codes: Vec<String>,
        watcher: W,
    ) -> Result<Subscription, StoreError>
    where
        W: Watcher<Vec<Customer>>,
    {
        self.observe(
            CustomersByPostalCode(PostalCodeFilter::new(limit, codes)),
            watcher,
        )
        .await
    }

    // --- Maintenance ---

    /// Removes every row of every table. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if the removal cannot be persisted.
    pub async fn clear_all_tables(&self) -> Result<usize, StoreError> {
        self.inner.ensure_open()?;
        let thingies = self.inner.thingies.clear().await?;
        let customers = self.inner.customers.clear().await?;
        Ok(thingies + customers)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.len()
    }
}

fn wrong_row(table: &str) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("row of another table stored in {table}"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::future::Future;
    use std::task::{Context, Poll, Wake, Waker};

    use stuff_core::Location;

    use super::*;

    fn customer(id: &str, postal_code: &str) -> Customer {
        Customer::new(postal_code, id, Location::new(1.0, 2.0), BTreeSet::new()).with_id(id)
    }

    struct NoopWake;

    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    #[tokio::test]
    async fn open_ephemeral_starts_empty_and_open() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();

        assert_eq!(db.state(), DatabaseState::Open);
        assert!(db.config().in_memory);
        assert_eq!(store.customer_count().unwrap(), 0);
        assert_eq!(store.customer_stats().unwrap(), CustomerStats::default());
    }

    #[test]
    fn open_outside_a_runtime_is_a_backend_error() {
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut open = std::pin::pin!(Database::open(DatabaseConfig::ephemeral()));

        // Fails on the first poll, before anything is awaited.
        match open.as_mut().poll(&mut cx) {
            Poll::Ready(result) => assert!(matches!(result, Err(StoreError::Backend(_)))),
            Poll::Pending => panic!("open without a runtime should fail immediately"),
        }
    }

    #[tokio::test]
    async fn duplicate_customer_is_rejected() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();

        store.insert_customer(customer("c-1", "10001")).await.unwrap();
        let err = store
            .insert_customer(customer("c-1", "90210"))
            .await
            .unwrap_err();

        assert!(err.is_constraint_violation());
        assert_eq!(
            store.find_customer("c-1").unwrap().unwrap().postal_code,
            "10001"
        );
    }

    #[tokio::test]
    async fn delete_thingy_removes_every_version() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();
        let first = store
            .insert_thingy(VersionedThingy::with_version("t", 1))
            .await
            .unwrap();
        store.insert_thingy(first.next_version()).await.unwrap();
        store
            .insert_thingy(VersionedThingy::with_version("other", 1))
            .await
            .unwrap();

        assert_eq!(store.find_thingy_versions("t").unwrap().len(), 2);
        assert_eq!(store.delete_thingy("t").await.unwrap(), 2);
        assert_eq!(store.delete_thingy("t").await.unwrap(), 0);
        assert!(store.find_thingy("other", 1).unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_all_tables_counts_rows_from_both_tables() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();
        store.insert_customer(customer("c-1", "10001")).await.unwrap();
        store
            .insert_thingy(VersionedThingy::with_version("t", 1))
            .await
            .unwrap();

        assert_eq!(store.clear_all_tables().await.unwrap(), 2);
        assert_eq!(store.customer_count().unwrap(), 0);
        assert!(store.find_thingy("t", 1).unwrap().is_none());
    }

    #[tokio::test]
    async fn operations_after_close_fail_closed() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();
        store.insert_customer(customer("c-1", "10001")).await.unwrap();

        db.close().await.unwrap();

        assert!(matches!(store.customer_count(), Err(StoreError::Closed)));
        assert!(matches!(
            store.insert_customer(customer("c-2", "10001")).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            store.observe(CustomerCount, |_: &usize| {}).await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn close_cancels_subscriptions() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();
        let subscription = store.observe(CustomerCount, |_: &usize| {}).await.unwrap();
        assert_eq!(store.subscription_count(), 1);

        db.close().await.unwrap();

        assert!(!subscription.is_active());
        assert_eq!(store.subscription_count(), 0);
    }

    #[tokio::test]
    async fn drop_without_close_cancels_subscriptions() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        let store = db.store();
        let subscription = store.observe(CustomerCount, |_: &usize| {}).await.unwrap();

        drop(db);

        assert!(!subscription.is_active());
        assert!(matches!(store.customer_count(), Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn begin_closing_only_succeeds_once() {
        let db = Database::open(DatabaseConfig::ephemeral()).await.unwrap();
        assert!(db.inner.begin_closing());
        assert!(!db.inner.begin_closing());
        assert_eq!(db.state(), DatabaseState::Closing);
    }

    #[cfg(not(feature = "redb"))]
    #[tokio::test]
    async fn durable_without_redb_is_unavailable() {
        let result = Database::open(DatabaseConfig::durable("unused.redb")).await;
        assert!(matches!(result, Err(StoreError::DurableStorageUnavailable)));
    }
}
