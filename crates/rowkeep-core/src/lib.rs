//! # rowkeep-core
//!
//! Dialect-agnostic building blocks for rowkeep:
//! - SQL values and their conversions to and from Rust field types
//! - Terms, criteria and a generic query builder that renders named
//!   placeholders, so values are always bound and never interpolated
//! - The [`Row`] protocol mapping typed rows to untyped [`Record`]s
//! - Adapters that split expected failures from unexpected ones
//!
//! ## Building a query
//!
//! ```rust
//! use rowkeep_core::builder::{field, Parameter, QueryBuilder, ToSql};
//! use rowkeep_core::dialect::GenericDialect;
//!
//! let sql = QueryBuilder::new()
//!     .into_table("users")
//!     .columns(["id", "name"])
//!     .insert([Parameter::new("id_0"), Parameter::new("name_0")])
//!     .to_sql(&GenericDialect)
//!     .unwrap();
//!
//! assert_eq!(sql, r#"INSERT INTO "users" ("id", "name") VALUES (:id_0, :name_0)"#);
//! ```

pub mod builder;
pub mod dialect;
pub mod error;
pub mod result;
pub mod row;

pub use builder::{
    Criterion, Field, Parameter, Parameters, QueryBuilder, QueryWithParameters, SqlValue, Table,
    Term, ToSql,
};
pub use dialect::Dialect;
pub use error::{QueryError, RowError};
pub use result::{returns_any_result, returns_result, BoxError, ResultExt};
pub use row::{Record, Row};
