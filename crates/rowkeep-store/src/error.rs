//! Error types for the connection wrapper and record stores.

use rowkeep_core::error::QueryError;
use rowkeep_core::result::BoxError;

/// Errors that can occur while talking to the database.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be opened or initialized.
    #[error("Failed to open database '{location}': {source}")]
    Connection {
        /// The location that was opened.
        location: String,
        /// The underlying engine error.
        #[source]
        source: sqlx::Error,
    },

    /// A configuration value was rejected.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// A scope was requested after `close`.
    #[error("Database connection is closed")]
    Closed,

    /// The engine rejected a statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A query could not be built or bound.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// No returned row mapped into the requested row type.
    #[error("Failed to find {row} in {table}")]
    NotFound {
        /// Row type name.
        row: &'static str,
        /// Table that was queried.
        table: String,
    },

    /// The caller combined arguments that cannot work together.
    #[error("Usage error: {0}")]
    Usage(String),

    /// An unexpected failure while mapping rows.
    #[error("Internal error: {0}")]
    Internal(#[source] BoxError),
}

impl StoreError {
    /// Returns whether this is the not-found outcome of a single-row lookup.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
