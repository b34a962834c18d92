//! Connection and store configuration.
//!
//! Everything here deserializes with `serde`, so options can come from a
//! JSON or TOML descriptor as well as from code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// SQLite journal modes accepted by `PRAGMA journal_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JournalMode {
    /// `DELETE`, the SQLite default.
    Delete,
    /// `TRUNCATE`.
    Truncate,
    /// `PERSIST`.
    Persist,
    /// `MEMORY`.
    Memory,
    /// `WAL`: readers do not block on a writer.
    #[default]
    Wal,
    /// `OFF`.
    Off,
}

impl JournalMode {
    /// Returns the pragma value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JournalMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(Self::Delete),
            "TRUNCATE" => Ok(Self::Truncate),
            "PERSIST" => Ok(Self::Persist),
            "MEMORY" => Ok(Self::Memory),
            "WAL" => Ok(Self::Wal),
            "OFF" => Ok(Self::Off),
            _ => Err(StoreError::InvalidOption(format!("unknown journal mode '{s}'"))),
        }
    }
}

impl TryFrom<String> for JournalMode {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JournalMode> for String {
    fn from(mode: JournalMode) -> Self {
        Self::from(mode.as_str())
    }
}

/// How a store resolves an insert that collides on its key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnConflict {
    /// Keep the stored row.
    #[default]
    DoNothing,
    /// Overwrite every non-key column with the incoming values.
    DoUpdate,
}

/// Options for [`Database::open`](crate::Database::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// A file path, `:memory:`, or a `sqlite:` URL.
    pub location: String,
    /// Journal mode set when `initialize` is true.
    pub journal_mode: JournalMode,
    /// Whether foreign keys are enforced, set when `initialize` is true.
    pub enforce_foreign_keys: bool,
    /// Whether to issue the pragmas on open.
    pub initialize: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            location: String::from(":memory:"),
            journal_mode: JournalMode::Wal,
            enforce_foreign_keys: true,
            initialize: true,
        }
    }
}

impl ConnectOptions {
    /// Creates options for `location` with default pragmas.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    /// Sets the journal mode.
    #[must_use]
    pub const fn journal_mode(mut self, journal_mode: JournalMode) -> Self {
        self.journal_mode = journal_mode;
        self
    }

    /// Sets foreign-key enforcement.
    #[must_use]
    pub const fn enforce_foreign_keys(mut self, enforce: bool) -> Self {
        self.enforce_foreign_keys = enforce;
        self
    }

    /// Sets whether pragmas are issued on open.
    #[must_use]
    pub const fn initialize(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_mode_parsing() {
        assert_eq!("wal".parse::<JournalMode>().unwrap(), JournalMode::Wal);
        assert_eq!("Delete".parse::<JournalMode>().unwrap(), JournalMode::Delete);
        assert!(matches!(
            "sideways".parse::<JournalMode>(),
            Err(StoreError::InvalidOption(_))
        ));
        assert_eq!(JournalMode::Truncate.to_string(), "TRUNCATE");
    }

    #[test]
    fn test_options_from_json_with_defaults() {
        let options: ConnectOptions =
            serde_json::from_str(r#"{"location": "app.db", "journal_mode": "delete"}"#).unwrap();
        assert_eq!(options.location, "app.db");
        assert_eq!(options.journal_mode, JournalMode::Delete);
        assert!(options.enforce_foreign_keys);
        assert!(options.initialize);

        let defaults: ConnectOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, ConnectOptions::default());
    }

    #[test]
    fn test_on_conflict_names() {
        let policy: OnConflict = serde_json::from_str(r#""do_update""#).unwrap();
        assert_eq!(policy, OnConflict::DoUpdate);
        assert_eq!(
            serde_json::to_string(&OnConflict::DoNothing).unwrap(),
            r#""do_nothing""#
        );
    }

    #[test]
    fn test_builder_setters() {
        let options = ConnectOptions::new("data.db")
            .journal_mode(JournalMode::Memory)
            .enforce_foreign_keys(false)
            .initialize(false);
        assert_eq!(options.journal_mode, JournalMode::Memory);
        assert!(!options.enforce_foreign_keys);
        assert!(!options.initialize);
    }
}
