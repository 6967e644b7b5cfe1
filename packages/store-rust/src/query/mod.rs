//! Query engine: filters, projections, and aggregates over one table.
//!
//! A [`Query`] is evaluated against a table's [`StorageEngine`]. The same
//! query value serves one-shot reads through the facade and live
//! subscriptions through the [`live`](crate::live) notifier, which uses
//! [`Query::affected_by`] to skip re-evaluation for unrelated mutations.

mod customer;
mod thingy;

pub use customer::{
    CustomerCount, CustomerStatsQuery, CustomersByPostalCode, DisplayTuplesByPostalCode,
    PostalCodeFilter,
};
pub use thingy::{ThingyByKey, ThingyVersions};

use stuff_core::{Customer, VersionedThingy};

use crate::storage::{RecordValue, StorageEngine};

/// A read over one table whose result can be observed live.
pub trait Query: Send + Sync + 'static {
    /// Result type delivered to callers and watchers.
    type Output: Send + Sync + 'static;

    /// Table the query reads.
    fn table(&self) -> &'static str;

    /// Whether inserting or removing `row` can change this query's result.
    ///
    /// May over-approximate; must never under-approximate.
    fn affected_by(&self, row: &RecordValue) -> bool;

    /// Computes the result from the table's current rows.
    fn evaluate(&self, rows: &dyn StorageEngine) -> Self::Output;
}

/// All customer rows currently in `rows`.
pub(crate) fn customers(rows: &dyn StorageEngine) -> impl Iterator<Item = Customer> {
    rows.snapshot_iter()
        .into_iter()
        .filter_map(|(_, record)| match record.value {
            RecordValue::Customer(customer) => Some(customer),
            RecordValue::VersionedThingy(_) => None,
        })
}

/// All versioned-thingy rows currently in `rows`.
pub(crate) fn thingies(rows: &dyn StorageEngine) -> impl Iterator<Item = VersionedThingy> {
    rows.snapshot_iter()
        .into_iter()
        .filter_map(|(_, record)| match record.value {
            RecordValue::VersionedThingy(thingy) => Some(thingy),
            RecordValue::Customer(_) => None,
        })
}
