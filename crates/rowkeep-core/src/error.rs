//! Error types for query building and row mapping.

use thiserror::Error;

/// Errors raised while building or rendering a query.
///
/// These are contract violations in the calling code (an invalid clause
/// combination, a placeholder without a value) rather than runtime
/// failures, so callers normally propagate them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// `ON CONFLICT` was requested on a statement that is not an INSERT.
    #[error("ON CONFLICT only applies to insert queries")]
    ConflictWithoutInsert,

    /// A conflict action was declared before `on_conflict`.
    #[error("ON CONFLICT must be declared before a conflict action")]
    ActionWithoutConflict,

    /// Both `DO NOTHING` and `DO UPDATE` were declared.
    #[error("cannot have two conflict handlers")]
    TwoConflictHandlers,

    /// Conflict targets were declared but no action was.
    #[error("no handler defined for ON CONFLICT")]
    NoConflictHandler,

    /// `DO UPDATE` was declared without conflict targets.
    #[error("cannot have fieldless ON CONFLICT DO UPDATE")]
    FieldlessConflictUpdate,

    /// A predicate was added to a `DO NOTHING` conflict clause.
    #[error("DO NOTHING does not support WHERE")]
    WhereOnDoNothing,

    /// A conflict predicate was added before any conflict target.
    #[error("cannot have fieldless ON CONFLICT WHERE")]
    FieldlessConflictWhere,

    /// `RETURNING` was requested on a statement that is not INSERT, UPDATE or DELETE.
    #[error("RETURNING can't be used in this query")]
    ReturningNotAllowed,

    /// A returned term references a table the statement cannot see.
    #[error("cannot return from table {0}")]
    ReturningForeignTable(String),

    /// An aggregate function was passed to `RETURNING`.
    #[error("aggregate functions are not allowed in RETURNING")]
    AggregateInReturning,

    /// The target dialect cannot render a clause the statement uses.
    #[error("the {dialect} dialect does not support {clause}")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// The clause, e.g. `RETURNING`.
        clause: &'static str,
    },

    /// The statement is missing a required clause.
    #[error("incomplete query: {0}")]
    Incomplete(&'static str),

    /// The SQL references a placeholder that has no bound value.
    #[error("missing value for parameter :{0}")]
    MissingParameter(String),

    /// A value is bound under a name the SQL never references.
    #[error("parameter :{0} is bound but never referenced")]
    UnusedParameter(String),
}

/// Errors raised while mapping a raw result row into a row type.
///
/// Row mapping failures are expected: store operations skip rows that fail
/// to map or turn the failure into a not-found outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// A required column is absent from the raw row.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// The stored value has the wrong type for the field.
    #[error("field `{column}`: expected {expected}, found {found}")]
    InvalidType {
        /// Column name.
        column: String,
        /// Expected Rust-side type.
        expected: &'static str,
        /// Storage class that was found.
        found: &'static str,
    },

    /// The stored integer does not fit the field type.
    #[error("field `{column}`: value {value} is out of range for {expected}")]
    OutOfRange {
        /// Column name.
        column: String,
        /// Expected Rust-side type.
        expected: &'static str,
        /// The offending value.
        value: i64,
    },

    /// The stored text could not be parsed into the field type.
    #[error("field `{column}`: {message}")]
    Malformed {
        /// Column name.
        column: String,
        /// Parser message.
        message: String,
    },
}

impl RowError {
    /// Returns the column this error refers to.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::MissingField(column)
            | Self::InvalidType { column, .. }
            | Self::OutOfRange { column, .. }
            | Self::Malformed { column, .. } => column,
        }
    }
}

/// Result type alias for query building.
pub type Result<T> = std::result::Result<T, QueryError>;
