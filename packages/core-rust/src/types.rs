use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Table holding [`VersionedThingy`] rows.
pub const VERSIONED_THINGY_TABLE: &str = "versioned_thingy";

/// Table holding [`Customer`] rows.
pub const CUSTOMER_TABLE: &str = "customer";

/// An append-style versioned record addressed by the composite key
/// `(id, version_code)`.
///
/// Both key fields are fixed at construction. A new version is a new row,
/// produced with [`VersionedThingy::next_version`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedThingy {
    id: String,
    version_code: i32,
}

impl VersionedThingy {
    /// Creates the first version (`version_code = 1`) of a thingy with a random id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_version(uuid::Uuid::new_v4().to_string(), 1)
    }

    /// Creates a thingy with an explicit composite key.
    #[must_use]
    pub fn with_version(id: impl Into<String>, version_code: i32) -> Self {
        Self {
            id: id.into(),
            version_code,
        }
    }

    /// Returns the next version of this thingy (same id, `version_code + 1`).
    #[must_use]
    pub fn next_version(&self) -> Self {
        Self::with_version(self.id.clone(), self.version_code.saturating_add(1))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn version_code(&self) -> i32 {
        self.version_code
    }

    /// Storage key for this thingy's composite key.
    #[must_use]
    pub fn key(&self) -> String {
        Self::storage_key(&self.id, self.version_code)
    }

    /// Encodes a composite key as a single storage key.
    ///
    /// The version code is written first: it never contains `:`, so the
    /// first separator always splits the two parts.
    #[must_use]
    pub fn storage_key(id: &str, version_code: i32) -> String {
        format!("{version_code}:{id}")
    }
}

impl Default for VersionedThingy {
    fn default() -> Self {
        Self::new()
    }
}

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A customer row.
///
/// `creation_date` belongs to the store: it is `None` until the customer is
/// inserted, and the insert overwrites whatever the caller put there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub postal_code: String,
    pub display_name: String,
    pub office_location: Location,
    pub tags: BTreeSet<String>,
    /// Millis since the Unix epoch, assigned at insert.
    pub creation_date: Option<i64>,
}

impl Customer {
    /// Creates a customer with a random id and no creation date.
    #[must_use]
    pub fn new(
        postal_code: impl Into<String>,
        display_name: impl Into<String>,
        office_location: Location,
        tags: BTreeSet<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            postal_code: postal_code.into(),
            display_name: display_name.into(),
            office_location,
            tags,
            creation_date: None,
        }
    }

    /// Replaces the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Projects this customer into its list-display form.
    #[must_use]
    pub fn display_tuple(&self) -> CustomerDisplayTuple {
        CustomerDisplayTuple {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Read-only projection of a [`Customer`] for list displays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDisplayTuple {
    pub id: String,
    pub display_name: String,
}

/// Aggregate over every customer row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerStats {
    /// Number of customers.
    pub count: usize,
    /// Lexicographically greatest postal code; `None` when there are no customers.
    pub max: Option<String>,
}

impl CustomerStats {
    /// Folds one more postal code into the aggregate.
    pub fn accumulate(&mut self, postal_code: &str) {
        self.count += 1;
        match &self.max {
            Some(max) if max.as_str() >= postal_code => {}
            _ => self.max = Some(postal_code.to_string()),
        }
    }
}
