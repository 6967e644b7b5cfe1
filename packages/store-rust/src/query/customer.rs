//! Customer queries: postal-code filters, display projection, aggregates.

use std::collections::BTreeSet;

use stuff_core::{Customer, CustomerDisplayTuple, CustomerStats, CUSTOMER_TABLE};

use super::{customers, Query};
use crate::storage::{RecordValue, StorageEngine};

/// Selects customers whose postal code is in a fixed set, capped at `limit`.
///
/// Results are ordered by `(postal_code, id)`. A zero limit or an empty code
/// set selects nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalCodeFilter {
    codes: BTreeSet<String>,
    limit: usize,
}

impl PostalCodeFilter {
    #[must_use]
    pub fn new<I, S>(limit: usize, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            limit,
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub fn codes(&self) -> &BTreeSet<String> {
        &self.codes
    }

    fn matches(&self, customer: &Customer) -> bool {
        self.codes.contains(&customer.postal_code)
    }

    fn select(&self, rows: &dyn StorageEngine) -> Vec<Customer> {
        if self.limit == 0 || self.codes.is_empty() {
            return Vec::new();
        }

        let mut selected: Vec<Customer> = customers(rows).filter(|c| self.matches(c)).collect();
        selected.sort_by(|a, b| {
            a.postal_code
                .cmp(&b.postal_code)
                .then_with(|| a.id.cmp(&b.id))
        });
        selected.truncate(self.limit);
        selected
    }

    fn affected_by(&self, row: &RecordValue) -> bool {
        row.as_customer().is_some_and(|c| self.matches(c))
    }
}

/// Full customer rows matching a [`PostalCodeFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomersByPostalCode(pub PostalCodeFilter);

impl Query for CustomersByPostalCode {
    type Output = Vec<Customer>;

    fn table(&self) -> &'static str {
        CUSTOMER_TABLE
    }

    fn affected_by(&self, row: &RecordValue) -> bool {
        self.0.affected_by(row)
    }

    fn evaluate(&self, rows: &dyn StorageEngine) -> Vec<Customer> {
        self.0.select(rows)
    }
}

/// Display projections of customers matching a [`PostalCodeFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTuplesByPostalCode(pub PostalCodeFilter);

impl Query for DisplayTuplesByPostalCode {
    type Output = Vec<CustomerDisplayTuple>;

    fn table(&self) -> &'static str {
        CUSTOMER_TABLE
    }

    fn affected_by(&self, row: &RecordValue) -> bool {
        self.0.affected_by(row)
    }

    fn evaluate(&self, rows: &dyn StorageEngine) -> Vec<CustomerDisplayTuple> {
        self.0
            .select(rows)
            .iter()
            .map(Customer::display_tuple)
            .collect()
    }
}

/// Number of customers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerCount;

impl Query for CustomerCount {
    type Output = usize;

    fn table(&self) -> &'static str {
        CUSTOMER_TABLE
    }

    fn affected_by(&self, row: &RecordValue) -> bool {
        row.as_customer().is_some()
    }

    fn evaluate(&self, rows: &dyn StorageEngine) -> usize {
        customers(rows).count()
    }
}

/// Count and maximum postal code over all customers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerStatsQuery;

impl Query for CustomerStatsQuery {
    type Output = CustomerStats;

    fn table(&self) -> &'static str {
        CUSTOMER_TABLE
    }

    fn affected_by(&self, row: &RecordValue) -> bool {
        row.as_customer().is_some()
    }

    fn evaluate(&self, rows: &dyn StorageEngine) -> CustomerStats {
        customers(rows).fold(CustomerStats::default(), |mut stats, customer| {
            stats.accumulate(&customer.postal_code);
            stats
        })
    }
}
