//! Database configuration.

use std::path::PathBuf;

/// Default file name for durable databases.
pub const DEFAULT_DB_FILE: &str = "stuff.redb";

/// Selects where a [`Database`](crate::Database) keeps its rows.
///
/// `in_memory = true` gives an ephemeral database that disappears when
/// closed; `path` is ignored in that mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Location of the durable database file.
    pub path: PathBuf,
    /// Keep rows in memory only.
    pub in_memory: bool,
}

impl DatabaseConfig {
    /// Ephemeral, non-persistent database (test mode).
    #[must_use]
    pub fn ephemeral() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    /// Durable database stored at `path`.
    #[must_use]
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            in_memory: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_FILE),
            in_memory: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_durable_in_working_directory() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, PathBuf::from("stuff.redb"));
        assert!(!config.in_memory);
    }

    #[test]
    fn ephemeral_sets_flag() {
        assert!(DatabaseConfig::ephemeral().in_memory);
    }

    #[test]
    fn durable_keeps_path() {
        let config = DatabaseConfig::durable("/tmp/db.redb");
        assert_eq!(config.path, PathBuf::from("/tmp/db.redb"));
        assert!(!config.in_memory);
    }
}
