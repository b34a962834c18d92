//! # rowkeep-sqlite
//!
//! SQLite-specific extensions for `rowkeep-core`.
//!
//! # What SQLite adds to the generic builder
//!
//! - **[UPSERT]**: `INSERT ... ON CONFLICT (...) DO NOTHING` and
//!   `DO UPDATE SET ...`, each with an optional `WHERE` (since SQLite
//!   3.24.0). A builder declares at most one of the two actions.
//! - **[RETURNING]**: on INSERT, UPDATE and DELETE (since SQLite 3.35.0).
//!   Returned terms may only reference tables the statement can see.
//! - **[WITH RECURSIVE]**: CTEs carry an explicit column list because
//!   SQLite does not infer CTE column names from a compound sub-query.
//! - **Parameters**: SQLite numbers `:name` placeholders by first
//!   appearance. Engine SQL uses `?NNN` so the bind order is explicit.
//!
//! [UPSERT]: https://www.sqlite.org/lang_upsert.html
//! [RETURNING]: https://www.sqlite.org/lang_returning.html
//! [WITH RECURSIVE]: https://www.sqlite.org/lang_with.html
//!
//! ## Example
//!
//! ```rust
//! use rowkeep_core::builder::Parameter;
//! use rowkeep_sqlite::SqliteQueryBuilder;
//!
//! let sql = SqliteQueryBuilder::new()
//!     .into_table("users")
//!     .columns(["id", "name"])
//!     .insert([Parameter::new("id_0"), Parameter::new("name_0")])
//!     .on_conflict(["id"])
//!     .and_then(SqliteQueryBuilder::do_nothing)
//!     .and_then(|q| q.get_sql())
//!     .unwrap();
//!
//! assert!(sql.ends_with(r#"ON CONFLICT ("id") DO NOTHING"#));
//! ```

pub mod builder;
mod dialect;

pub use builder::{Returning, SqliteQueryBuilder};
pub use dialect::SqliteDialect;
