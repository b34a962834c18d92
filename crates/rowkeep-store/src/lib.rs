//! # rowkeep-store
//!
//! A SQLite connection wrapper and typed record stores.
//!
//! - [`Database`] owns one connection and hands out [`Reader`] and
//!   [`Writer`] scopes. A writer commits when it finishes successfully and
//!   rolls back otherwise.
//! - [`Store`] maps a [`Schema`] onto upserts and equality lookups that
//!   return typed rows.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rowkeep_store::{Database, Lookup, OnConflict, Row, Schema, Store};
//!
//! #[derive(Debug, Clone, PartialEq, Row)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! struct Users;
//!
//! impl Schema for Users {
//!     type Row = User;
//!     const TABLE_NAME: &'static str = "users";
//!     const ON_CONFLICT: OnConflict = OnConflict::DoUpdate;
//!     const CREATE_TABLE_SQLS: &'static [&'static str] =
//!         &["CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"];
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> rowkeep_store::Result<()> {
//! let db = Arc::new(Database::open_in_memory().await?);
//! let users = Store::<Users>::create(db).await?;
//!
//! users.add(&User { id: 1, name: String::from("a") }).await?;
//! users.add(&User { id: 1, name: String::from("b") }).await?;
//!
//! let stored = users.get(&Lookup::new().filter("id", 1_i64)).await?;
//! assert_eq!(stored, vec![User { id: 1, name: String::from("b") }]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod query;
pub mod store;

pub use config::{ConnectOptions, JournalMode, OnConflict};
pub use database::{ConnectionGuard, Database, Reader, Writer};
pub use error::{Result, StoreError};
pub use store::{Lookup, Projection, Schema, Store};

pub use rowkeep_core;
pub use rowkeep_core::row::Row;
pub use rowkeep_derive::Row;
pub use rowkeep_sqlite;
