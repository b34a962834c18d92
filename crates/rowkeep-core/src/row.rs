//! Row types and the records they map to and from.
//!
//! A [`Row`] is a struct with a fixed, ordered set of named columns. A
//! [`Record`] is the untyped form: ordered `(column, value)` pairs as the
//! engine returns them. Mapping a record into a row only looks at the
//! declared columns; anything else in the record is ignored.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::builder::value::{FromSqlValue, SqlValue, ToSqlValue};
use crate::error::RowError;

/// A typed table row.
///
/// Usually derived with `#[derive(Row)]`.
pub trait Row: Sized {
    /// Column names in declaration order.
    const COLUMNS: &'static [&'static str];

    /// Serializes the row into a flat column → value record.
    fn to_record(&self) -> Record;

    /// Builds a row from a record.
    ///
    /// # Errors
    ///
    /// Returns a [`RowError`] when a required column is missing or holds a
    /// value of the wrong type.
    fn from_record(record: &Record) -> Result<Self, RowError>;
}

/// Ordered column → value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, SqlValue)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: vec![] }
    }

    /// Sets `column`, replacing an existing value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: impl ToSqlValue) {
        let column = column.into();
        let value = value.to_sql_value();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Builder form of [`Record::insert`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.insert(column, value);
        self
    }

    /// Returns the value of `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Decodes `column` into a field type.
    ///
    /// # Errors
    ///
    /// Returns [`RowError::MissingField`] when the column is absent and the
    /// type has no absent value, or the decoding error of the type.
    pub fn decode<T: FromSqlValue>(&self, column: &str) -> Result<T, RowError> {
        match self.get(column) {
            Some(value) => T::from_sql_value(column, value),
            None => T::from_missing(column),
        }
    }

    /// Keeps only `columns`, in the order given.
    #[must_use]
    pub fn project(&self, columns: &[&str]) -> Self {
        columns
            .iter()
            .filter_map(|column| {
                self.get(column)
                    .map(|value| (String::from(*column), value.clone()))
            })
            .collect()
    }

    /// Returns the column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, value) in &self.entries {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
