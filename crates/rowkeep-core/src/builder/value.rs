//! SQL values, and conversions between them and Rust field types.
//!
//! Values reach the database as bound parameters. Inline rendering exists
//! only for literal terms written by the query author (for example a
//! `DO UPDATE SET col = <literal>` override) and escapes quotes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::RowError;

/// A SQL value that can be used as a parameter.
///
/// The variants follow SQLite's storage classes, plus `Bool` which SQLite
/// stores as an integer.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped).
    ///
    /// **Warning**: Prefer using parameterized queries instead.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            // SQL has no literal for NaN or infinity.
            Self::Float(f) if !f.is_finite() => String::from("NULL"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => {
                // Escape single quotes by doubling them
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Returns the name of the storage class holding this value.
    #[must_use]
    pub const fn storage_class(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) | Self::Int(_) => "INTEGER",
            Self::Float(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }

    /// Returns whether this is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Blob(b) => serializer.serialize_bytes(b),
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! impl_to_sql_value_int {
    ($($ty:ty),+) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )+
    };
}

impl_to_sql_value_int!(i64, i32, i16, i8, u32, u16, u8);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

/// JSON is stored as its text encoding; `null` is SQL NULL.
impl ToSqlValue for serde_json::Value {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Self::Null => SqlValue::Null,
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.to_rfc3339())
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.format(NAIVE_DATETIME_FORMAT).to_string())
    }
}

impl ToSqlValue for Uuid {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.hyphenated().to_string())
    }
}

const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Trait for field types that can be decoded from a stored value.
pub trait FromSqlValue: Sized {
    /// Decodes the stored value of `column`.
    ///
    /// # Errors
    ///
    /// Returns a [`RowError`] when the value has an incompatible type or
    /// cannot be parsed.
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError>;

    /// Value to use when `column` is absent from the row.
    ///
    /// # Errors
    ///
    /// Returns [`RowError::MissingField`] unless the type has a natural
    /// "absent" value.
    fn from_missing(column: &str) -> Result<Self, RowError> {
        Err(RowError::MissingField(String::from(column)))
    }
}

fn invalid_type(column: &str, expected: &'static str, value: &SqlValue) -> RowError {
    RowError::InvalidType {
        column: String::from(column),
        expected,
        found: value.storage_class(),
    }
}

fn malformed(column: &str, message: impl ToString) -> RowError {
    RowError::Malformed {
        column: String::from(column),
        message: message.to_string(),
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(_column: &str, value: &SqlValue) -> Result<Self, RowError> {
        Ok(value.clone())
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Int(n) => Ok(*n),
            SqlValue::Bool(b) => Ok(Self::from(*b)),
            other => Err(invalid_type(column, "integer", other)),
        }
    }
}

macro_rules! impl_from_sql_value_narrow_int {
    ($($ty:ty),+) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
                    let wide = i64::from_sql_value(column, value)?;
                    <$ty>::try_from(wide).map_err(|_| RowError::OutOfRange {
                        column: String::from(column),
                        expected: stringify!($ty),
                        value: wide,
                    })
                }
            }
        )+
    };
}

impl_from_sql_value_narrow_int!(i32, i16, i8, u32, u16, u8, u64, usize);

impl FromSqlValue for bool {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(0) => Ok(false),
            SqlValue::Int(1) => Ok(true),
            SqlValue::Int(n) => Err(RowError::OutOfRange {
                column: String::from(column),
                expected: "bool",
                value: *n,
            }),
            other => Err(invalid_type(column, "bool", other)),
        }
    }
}

impl FromSqlValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Float(f) => Ok(*f),
            SqlValue::Int(n) => Ok(*n as Self),
            other => Err(invalid_type(column, "float", other)),
        }
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        f64::from_sql_value(column, value).map(|f| f as Self)
    }
}

impl FromSqlValue for String {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            other => Err(invalid_type(column, "text", other)),
        }
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Blob(b) => Ok(b.clone()),
            SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(invalid_type(column, "blob", other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(column, other).map(Some),
        }
    }

    fn from_missing(_column: &str) -> Result<Self, RowError> {
        Ok(None)
    }
}

impl FromSqlValue for serde_json::Value {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Null => Ok(Self::Null),
            SqlValue::Bool(b) => Ok(Self::Bool(*b)),
            SqlValue::Int(n) => Ok(Self::from(*n)),
            SqlValue::Float(f) => Ok(Self::from(*f)),
            SqlValue::Text(s) => serde_json::from_str(s).map_err(|e| malformed(column, e)),
            other @ SqlValue::Blob(_) => Err(invalid_type(column, "json", other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, NAIVE_DATETIME_FORMAT).map(|dt| dt.and_utc())
                })
                .map_err(|e| malformed(column, e)),
            SqlValue::Int(secs) => {
                Self::from_timestamp(*secs, 0).ok_or_else(|| RowError::OutOfRange {
                    column: String::from(column),
                    expected: "timestamp",
                    value: *secs,
                })
            }
            other => Err(invalid_type(column, "timestamp", other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Text(s) => Self::parse_from_str(s, NAIVE_DATETIME_FORMAT)
                .or_else(|_| Self::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|e| malformed(column, e)),
            other => Err(invalid_type(column, "datetime", other)),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RowError> {
        match value {
            SqlValue::Text(s) => Self::parse_str(s).map_err(|e| malformed(column, e)),
            SqlValue::Blob(b) => Self::from_slice(b).map_err(|e| malformed(column, e)),
            other => Err(invalid_type(column, "uuid", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_inline_null() {
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
    }

    #[test]
    fn test_sql_value_inline_float() {
        assert_eq!(SqlValue::Float(1.5).to_sql_inline(), "1.5");
        assert_eq!(SqlValue::Float(f64::NAN).to_sql_inline(), "NULL");
        assert_eq!(SqlValue::Float(f64::INFINITY).to_sql_inline(), "NULL");
        assert_eq!(SqlValue::Float(f64::NEG_INFINITY).to_sql_inline(), "NULL");
    }

    #[test]
    fn test_sql_value_inline_text_escaping() {
        // Single quotes are escaped by doubling
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).to_sql_inline(),
            "'O''Brien'"
        );
    }

    #[test]
    fn test_sql_injection_prevention() {
        let malicious = "'; DROP TABLE users; --";
        let escaped = SqlValue::Text(String::from(malicious)).to_sql_inline();
        // The single quote is escaped, preventing the injection
        assert_eq!(escaped, "'''; DROP TABLE users; --'");
    }

    #[test]
    fn test_sql_value_inline_blob() {
        assert_eq!(
            SqlValue::Blob(vec![0x48, 0x45, 0x4C, 0x4C, 0x4F]).to_sql_inline(),
            "X'48454C4C4F'"
        );
    }

    #[test]
    fn test_to_sql_value_conversions() {
        assert_eq!(true.to_sql_value(), SqlValue::Bool(true));
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(2.5_f64.to_sql_value(), SqlValue::Float(2.5));
        assert_eq!(None::<i32>.to_sql_value(), SqlValue::Null);
        assert_eq!(
            serde_json::json!({"a": [1, 2]}).to_sql_value(),
            SqlValue::Text(String::from(r#"{"a":[1,2]}"#))
        );
        assert_eq!(
            serde_json::json!("quoted").to_sql_value(),
            SqlValue::Text(String::from(r#""quoted""#))
        );
    }

    #[test]
    fn test_uuid_encodes_as_text() {
        let id = Uuid::nil();
        assert_eq!(
            id.to_sql_value(),
            SqlValue::Text(String::from("00000000-0000-0000-0000-000000000000"))
        );
        assert_eq!(Uuid::from_sql_value("id", &id.to_sql_value()), Ok(id));
    }

    #[test]
    fn test_decode_integers() {
        assert_eq!(i64::from_sql_value("n", &SqlValue::Int(7)), Ok(7));
        assert_eq!(
            u8::from_sql_value("n", &SqlValue::Int(300)),
            Err(RowError::OutOfRange {
                column: String::from("n"),
                expected: "u8",
                value: 300,
            })
        );
        assert_eq!(
            i64::from_sql_value("n", &SqlValue::Text(String::from("7"))),
            Err(RowError::InvalidType {
                column: String::from("n"),
                expected: "integer",
                found: "TEXT",
            })
        );
    }

    #[test]
    fn test_decode_bool_from_integer() {
        assert_eq!(bool::from_sql_value("b", &SqlValue::Int(1)), Ok(true));
        assert_eq!(bool::from_sql_value("b", &SqlValue::Int(0)), Ok(false));
        assert!(bool::from_sql_value("b", &SqlValue::Int(2)).is_err());
    }

    #[test]
    fn test_decode_option() {
        assert_eq!(Option::<String>::from_sql_value("s", &SqlValue::Null), Ok(None));
        assert_eq!(Option::<String>::from_missing("s"), Ok(None));
        assert_eq!(
            String::from_missing("s"),
            Err(RowError::MissingField(String::from("s")))
        );
    }

    #[test]
    fn test_decode_json_text() {
        let value = serde_json::Value::from_sql_value(
            "payload",
            &SqlValue::Text(String::from(r#"{"k": true}"#)),
        )
        .unwrap();
        assert_eq!(value, serde_json::json!({"k": true}));
        assert!(matches!(
            serde_json::Value::from_sql_value("payload", &SqlValue::Text(String::from("{"))),
            Err(RowError::Malformed { .. })
        ));
    }

    #[test]
    fn test_datetime_round_trip_through_text() {
        let now = DateTime::parse_from_rfc3339("2024-05-01T12:30:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let stored = now.to_sql_value();
        assert_eq!(DateTime::<Utc>::from_sql_value("at", &stored), Ok(now));
        let sqlite_default = SqlValue::Text(String::from("2024-05-01 12:30:00"));
        assert_eq!(DateTime::<Utc>::from_sql_value("at", &sqlite_default), Ok(now));
    }
}
