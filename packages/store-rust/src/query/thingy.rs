//! Versioned-thingy queries.

use stuff_core::{VersionedThingy, VERSIONED_THINGY_TABLE};

use super::{thingies, Query};
use crate::storage::{RecordValue, StorageEngine};

/// Point lookup by composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingyByKey {
    pub id: String,
    pub version_code: i32,
}

impl ThingyByKey {
    #[must_use]
    pub fn new(id: impl Into<String>, version_code: i32) -> Self {
        Self {
            id: id.into(),
            version_code,
        }
    }

    fn key(&self) -> String {
        VersionedThingy::storage_key(&self.id, self.version_code)
    }
}

impl Query for ThingyByKey {
    type Output = Option<VersionedThingy>;

    fn table(&self) -> &'static str {
        VERSIONED_THINGY_TABLE
    }

    fn affected_by(&self, row: &RecordValue) -> bool {
        row.as_thingy()
            .is_some_and(|t| t.id() == self.id && t.version_code() == self.version_code)
    }

    fn evaluate(&self, rows: &dyn StorageEngine) -> Option<VersionedThingy> {
        rows.get(&self.key())
            .and_then(|record| record.value.as_thingy().cloned())
    }
}

/// Every version of one thingy id, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingyVersions {
    pub id: String,
}

impl ThingyVersions {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Query for ThingyVersions {
    type Output = Vec<VersionedThingy>;

    fn table(&self) -> &'static str {
        VERSIONED_THINGY_TABLE
    }

    fn affected_by(&self, row: &RecordValue) -> bool {
        row.as_thingy().is_some_and(|t| t.id() == self.id)
    }

    fn evaluate(&self, rows: &dyn StorageEngine) -> Vec<VersionedThingy> {
        let mut versions: Vec<VersionedThingy> =
            thingies(rows).filter(|t| t.id() == self.id).collect();
        versions.sort_by_key(VersionedThingy::version_code);
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::engines::HashMapStorage;
    use crate::storage::{Record, RecordMetadata};

    fn table(rows: &[VersionedThingy]) -> HashMapStorage {
        let storage = HashMapStorage::new();
        for row in rows {
            storage.put(
                &row.key(),
                Record {
                    value: RecordValue::from(row.clone()),
                    metadata: RecordMetadata::new(0),
                },
            );
        }
        storage
    }

    #[test]
    fn by_key_finds_exact_version_only() {
        let rows = table(&[
            VersionedThingy::with_version("a", 1),
            VersionedThingy::with_version("a", 2),
        ]);

        assert_eq!(
            ThingyByKey::new("a", 2).evaluate(&rows),
            Some(VersionedThingy::with_version("a", 2))
        );
        assert_eq!(ThingyByKey::new("a", 3).evaluate(&rows), None);
        assert_eq!(ThingyByKey::new("b", 1).evaluate(&rows), None);
    }

    #[test]
    fn versions_are_sorted_and_scoped_to_id() {
        let rows = table(&[
            VersionedThingy::with_version("a", 3),
            VersionedThingy::with_version("a", 1),
            VersionedThingy::with_version("b", 2),
        ]);

        let versions = ThingyVersions::new("a").evaluate(&rows);
        let codes: Vec<i32> = versions.iter().map(VersionedThingy::version_code).collect();
        assert_eq!(codes, vec![1, 3]);
    }

    #[test]
    fn affected_by_matches_key_or_id() {
        let row = RecordValue::from(VersionedThingy::with_version("a", 2));

        assert!(ThingyByKey::new("a", 2).affected_by(&row));
        assert!(!ThingyByKey::new("a", 1).affected_by(&row));
        assert!(ThingyVersions::new("a").affected_by(&row));
        assert!(!ThingyVersions::new("b").affected_by(&row));
    }
}
