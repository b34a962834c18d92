//! SQL builder.
//!
//! Builders render SQL text with named placeholders (`:name`); values travel
//! separately in a [`QueryWithParameters`] and are bound by the engine, never
//! interpolated. Literal terms are the exception and are escaped.
//!
//! # Example
//!
//! ```rust
//! use rowkeep_core::builder::{
//!     field, Parameter, Parameters, QueryBuilder, QueryWithParameters, SqlValue,
//! };
//! use rowkeep_core::dialect::GenericDialect;
//!
//! let query = QueryBuilder::new()
//!     .from_("users")
//!     .select([field("id")])
//!     .where_(field("name").eq(Parameter::new("name")));
//! let mut parameters = Parameters::new();
//! parameters.insert(String::from("name"), SqlValue::Text(String::from("'; DROP TABLE users; --")));
//!
//! let prepared = QueryWithParameters::new(query, parameters)
//!     .prepare(&GenericDialect)
//!     .unwrap();
//! assert_eq!(prepared.sql, r#"SELECT "id" FROM "users" WHERE "name" = ?1"#);
//! ```

mod params;
mod query;
pub mod term;
pub mod value;

pub use params::{
    bind_named_parameters, is_placeholder_name, AliasedQuery, AliasedQueryWithParameters,
    Parameters, PreparedStatement, QueryWithParameters, RawSql, ToSql,
};
pub use query::{JoinKind, Order, QueryBuilder, StatementKind};
pub use term::{
    avg, coalesce, count, count_star, field, last_insert_rowid, lower, max, min, sum, upper,
    ArithmeticOp, CompareOp, Criterion, Field, Function, Parameter, RenderContext, Table, Term,
};
pub use value::{FromSqlValue, SqlValue, ToSqlValue};
