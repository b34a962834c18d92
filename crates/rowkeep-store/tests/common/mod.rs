#![allow(dead_code)]

use std::sync::Arc;

use rowkeep_store::{Database, OnConflict, Row, Schema, Store};

#[derive(Debug, Clone, PartialEq, Row)]
pub struct User {
    pub id: i64,
    pub name: String,
}

pub fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: String::from(name),
    }
}

pub struct Users;

impl Schema for Users {
    type Row = User;
    const TABLE_NAME: &'static str = "users";
    const ON_CONFLICT: OnConflict = OnConflict::DoUpdate;
    const CREATE_TABLE_SQLS: &'static [&'static str] = &[
        "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        "CREATE TABLE IF NOT EXISTS archived_users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    ];
}

#[derive(Debug, Clone, PartialEq, Row)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    #[row(rename = "body_text")]
    pub body: String,
    pub pinned: bool,
    pub score: Option<f64>,
}

pub struct Notes;

impl Schema for Notes {
    type Row = Note;
    const TABLE_NAME: &'static str = "notes";
    const CREATE_TABLE_SQLS: &'static [&'static str] = &["CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users (id),
            body_text TEXT NOT NULL,
            pinned BOOLEAN NOT NULL,
            score REAL
        )"];
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Row)]
pub struct Node {
    pub id: i64,
    pub parent_id: Option<i64>,
}

pub struct Nodes;

impl Schema for Nodes {
    type Row = Node;
    const TABLE_NAME: &'static str = "nodes";
    const CREATE_TABLE_SQLS: &'static [&'static str] =
        &["CREATE TABLE IF NOT EXISTS nodes (id INTEGER PRIMARY KEY, parent_id INTEGER)"];
}

pub async fn memory_db() -> Arc<Database> {
    Arc::new(
        Database::open_in_memory()
            .await
            .expect("Failed to open in-memory database"),
    )
}

pub async fn store<S: Schema>(db: &Arc<Database>) -> Store<S> {
    Store::<S>::create(Arc::clone(db))
        .await
        .unwrap_or_else(|e| panic!("Failed to create {}: {e}", S::TABLE_NAME))
}
