//! Record types for the storage layer.
//!
//! Defines the core data structures stored in [`StorageEngine`](super::StorageEngine):
//! [`Record`], [`RecordMetadata`], and [`RecordValue`].

use serde::{Deserialize, Serialize};
use stuff_core::{Customer, VersionedThingy, CUSTOMER_TABLE, VERSIONED_THINGY_TABLE};

/// Store-internal bookkeeping for a [`Record`]. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Wall-clock time (millis since epoch) when this record entered memory:
    /// its insert, or the open that loaded it back from disk.
    pub creation_time: i64,
}

impl RecordMetadata {
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self { creation_time: now }
    }
}

/// The value portion of a record: one entity row.
///
/// Serialized to `MsgPack` for persistence in the `MapDataStore` layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordValue {
    /// A row of the versioned-thingy table.
    VersionedThingy(VersionedThingy),
    /// A row of the customer table.
    Customer(Customer),
}

impl RecordValue {
    /// Name of the table this row belongs to.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::VersionedThingy(_) => VERSIONED_THINGY_TABLE,
            Self::Customer(_) => CUSTOMER_TABLE,
        }
    }

    /// Primary storage key of this row.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::VersionedThingy(thingy) => thingy.key(),
            Self::Customer(customer) => customer.id.clone(),
        }
    }

    /// Assigns store-generated fields. Called once, at insert.
    pub fn stamp_created(&mut self, now: i64) {
        if let Self::Customer(customer) = self {
            customer.creation_date = Some(now);
        }
    }

    #[must_use]
    pub fn as_customer(&self) -> Option<&Customer> {
        match self {
            Self::Customer(customer) => Some(customer),
            Self::VersionedThingy(_) => None,
        }
    }

    #[must_use]
    pub fn as_thingy(&self) -> Option<&VersionedThingy> {
        match self {
            Self::VersionedThingy(thingy) => Some(thingy),
            Self::Customer(_) => None,
        }
    }

    #[must_use]
    pub fn into_customer(self) -> Option<Customer> {
        match self {
            Self::Customer(customer) => Some(customer),
            Self::VersionedThingy(_) => None,
        }
    }

    #[must_use]
    pub fn into_thingy(self) -> Option<VersionedThingy> {
        match self {
            Self::VersionedThingy(thingy) => Some(thingy),
            Self::Customer(_) => None,
        }
    }
}

impl From<VersionedThingy> for RecordValue {
    fn from(thingy: VersionedThingy) -> Self {
        Self::VersionedThingy(thingy)
    }
}

impl From<Customer> for RecordValue {
    fn from(customer: Customer) -> Self {
        Self::Customer(customer)
    }
}

/// A complete record: entity row + store-internal metadata.
///
/// This is the primary unit of storage in the [`StorageEngine`](super::StorageEngine).
#[derive(Debug, Clone)]
pub struct Record {
    /// The entity row.
    pub value: RecordValue,
    /// Store-internal metadata.
    pub metadata: RecordMetadata,
}
