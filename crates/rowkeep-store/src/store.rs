//! Generic record stores.
//!
//! A [`Schema`] names a table, its key column, its DDL and its conflict
//! policy. A [`Store`] built from it inserts and looks up typed rows.
//!
//! Inserts are one multi-row `INSERT ... ON CONFLICT ... RETURNING`
//! statement run under a write scope. Lookups are a `SELECT` with one
//! bound equality filter per column, run under a read scope. Rows that do
//! not map into the row type are skipped.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rowkeep_core::builder::{
    field, is_placeholder_name, last_insert_rowid, AliasedQuery, Field, Parameter, Parameters,
    QueryWithParameters, Table, ToSql, ToSqlValue,
};
use rowkeep_core::row::Row;
use rowkeep_sqlite::SqliteQueryBuilder;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, info};

use crate::config::OnConflict;
use crate::database::{Database, Writer};
use crate::error::{Result, StoreError};
use crate::query::{execute_raw, fetch_rows, map_many, map_one, map_one_or_none};

const ROWID: &str = "rowid";

/// Describes the table behind a [`Store`].
///
/// ```rust
/// use rowkeep_store::{OnConflict, Row, Schema};
///
/// #[derive(Debug, Clone, PartialEq, Row)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// struct Users;
///
/// impl Schema for Users {
///     type Row = User;
///     const TABLE_NAME: &'static str = "users";
///     const ON_CONFLICT: OnConflict = OnConflict::DoUpdate;
///     const CREATE_TABLE_SQLS: &'static [&'static str] =
///         &["CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"];
/// }
/// ```
pub trait Schema: 'static {
    /// The row type stored in the table.
    type Row: Row;

    /// Table name.
    const TABLE_NAME: &'static str;

    /// Key column used as the conflict target.
    const ID_COLUMN: &'static str = "id";

    /// What an insert does when the key already exists.
    const ON_CONFLICT: OnConflict = OnConflict::DoNothing;

    /// DDL run by [`Store::create`], in order.
    const CREATE_TABLE_SQLS: &'static [&'static str] = &[];
}

/// Overrides the table and columns an operation works on.
///
/// Column names need a table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    /// Table to use instead of the schema's table.
    pub table_name: Option<String>,
    /// Columns to use instead of the row type's columns.
    pub column_names: Option<Vec<String>>,
}

impl Projection {
    /// Creates an empty projection: the schema's table and columns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the table name.
    #[must_use]
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Sets the column names.
    #[must_use]
    pub fn columns<C: Into<String>>(mut self, column_names: impl IntoIterator<Item = C>) -> Self {
        self.column_names = Some(column_names.into_iter().map(Into::into).collect());
        self
    }

    fn table_for<S: Schema>(&self) -> &str {
        self.table_name.as_deref().unwrap_or(S::TABLE_NAME)
    }

    fn resolve<S: Schema>(&self) -> Result<(Table, Vec<String>)> {
        let column_names = match (&self.table_name, &self.column_names) {
            (None, Some(_)) => {
                return Err(StoreError::Usage(String::from(
                    "column names require a table name",
                )));
            }
            (_, Some(names)) => names.clone(),
            (_, None) => S::Row::COLUMNS.iter().map(|&c| String::from(c)).collect(),
        };
        Ok((Table::new(self.table_for::<S>()), column_names))
    }
}

/// Equality filters and an optional projection for a lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lookup {
    /// Table and column overrides.
    pub projection: Projection,
    /// Column name to required value.
    pub filters: Parameters,
}

impl Lookup {
    /// Creates a lookup with no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `column` to equal `value`.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl ToSqlValue) -> Self {
        self.filters.insert(column.into(), value.to_sql_value());
        self
    }

    /// Sets the projection.
    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

/// A typed store over one table.
pub struct Store<S: Schema> {
    db: Arc<Database>,
    schema: PhantomData<fn() -> S>,
}

impl<S: Schema> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            schema: PhantomData,
        }
    }
}

impl<S: Schema> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("table", &S::TABLE_NAME)
            .field("db", &self.db.location())
            .finish()
    }
}

impl<S: Schema> Store<S> {
    /// Creates a store without running any DDL.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            schema: PhantomData,
        }
    }

    /// Creates a store and runs the schema's DDL in one write scope.
    ///
    /// # Errors
    ///
    /// Returns the first DDL failure; earlier statements are rolled back.
    pub async fn create(db: Arc<Database>) -> Result<Self> {
        let store = Self::new(db);
        let writer = store.db.writer().await?;
        let result = run_ddl(&writer, S::CREATE_TABLE_SQLS).await;
        writer.finish(result).await?;
        info!(table = S::TABLE_NAME, "Created store");
        Ok(store)
    }

    /// Returns the database this store writes to.
    #[must_use]
    pub const fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Returns the row type's column names.
    #[must_use]
    pub fn column_names() -> &'static [&'static str] {
        S::Row::COLUMNS
    }

    /// Returns the row type's columns as unqualified fields.
    #[must_use]
    pub fn columns() -> Vec<Field> {
        S::Row::COLUMNS.iter().map(|&c| field(c)).collect()
    }

    /// Returns a fresh builder for custom queries.
    #[must_use]
    pub fn query_builder() -> SqliteQueryBuilder {
        SqliteQueryBuilder::new()
    }

    /// Names `query` as a CTE with the given columns.
    pub fn aliased_query<C: Into<String>>(
        query: impl ToSql + Send + Sync + 'static,
        name: impl Into<String>,
        column_names: impl IntoIterator<Item = C>,
    ) -> AliasedQuery {
        AliasedQuery::new(name, column_names, query)
    }

    /// Returns a table reference to a CTE.
    #[must_use]
    pub fn table_from_aliased_query(query: &AliasedQuery) -> Table {
        query.table()
    }

    /// Builds the upsert for `rows`.
    ///
    /// Each value is bound as `<column>_<row index>`, or by position when the
    /// column is not a plain identifier. The conflict target is
    /// the key column; `DoUpdate` overwrites every other column and falls
    /// back to `DO NOTHING` when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Usage`] for an invalid projection or when a row
    /// lacks a projected column, and [`StoreError::Query`] when the statement
    /// cannot be built.
    pub fn create_row_query(
        rows: &[S::Row],
        projection: &Projection,
    ) -> Result<QueryWithParameters<SqliteQueryBuilder>> {
        let (table, column_names) = projection.resolve::<S>()?;

        let mut query = SqliteQueryBuilder::new()
            .into_table(table)
            .columns(column_names.iter().map(String::as_str));
        let mut parameters = Parameters::new();

        for (index, row) in rows.iter().enumerate() {
            let record = row.to_record();
            let mut placeholders = Vec::with_capacity(column_names.len());
            for name in &column_names {
                let Some(value) = record.get(name) else {
                    return Err(StoreError::Usage(format!(
                        "{} has no column '{name}'",
                        std::any::type_name::<S::Row>()
                    )));
                };
                let key = insert_key(name, placeholders.len(), index);
                parameters.insert(key.clone(), value.clone());
                placeholders.push(Parameter::new(key));
            }
            query = query.insert(placeholders);
        }

        query = query.on_conflict([S::ID_COLUMN])?;
        let updates: Vec<&str> = column_names
            .iter()
            .map(String::as_str)
            .filter(|&name| name != S::ID_COLUMN)
            .collect();
        query = match S::ON_CONFLICT {
            OnConflict::DoUpdate if !updates.is_empty() => updates
                .into_iter()
                .try_fold(query, SqliteQueryBuilder::do_update)?,
            OnConflict::DoUpdate | OnConflict::DoNothing => query.do_nothing()?,
        };
        query = query.returning(column_names.iter().map(String::as_str))?;

        Ok(QueryWithParameters::new(query, parameters))
    }

    /// Builds the lookup query: the projected columns, one bound equality
    /// filter per entry, ANDed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Usage`] for an invalid projection.
    pub fn get_rows_query(lookup: &Lookup) -> Result<QueryWithParameters<SqliteQueryBuilder>> {
        let (table, column_names) = lookup.projection.resolve::<S>()?;

        let query = SqliteQueryBuilder::new()
            .from_(table.clone())
            .select(column_names.iter().map(|name| table.field(name.as_str())));
        where_equal(query, &table, &lookup.filters)
    }

    /// Inserts one row and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no returned row maps, as with a
    /// `DO NOTHING` conflict. Engine errors roll the write back.
    pub async fn add(&self, row: &S::Row) -> Result<S::Row> {
        let rows = self.insert(std::slice::from_ref(row), &Projection::new()).await?;
        map_one(&rows, S::TABLE_NAME)
    }

    /// Inserts rows in one statement and returns those that map back.
    ///
    /// # Errors
    ///
    /// Engine errors roll the write back and are returned.
    pub async fn add_many(&self, rows: &[S::Row]) -> Result<Vec<S::Row>> {
        self.add_many_with(rows, &Projection::new()).await
    }

    /// Like [`Store::add_many`], against another table or column set.
    ///
    /// # Errors
    ///
    /// See [`Store::create_row_query`] and [`Store::add_many`].
    pub async fn add_many_with(
        &self,
        rows: &[S::Row],
        projection: &Projection,
    ) -> Result<Vec<S::Row>> {
        let rows = self.insert(rows, projection).await?;
        map_many(&rows)
    }

    /// Inserts one row inside an open write scope.
    ///
    /// # Errors
    ///
    /// See [`Store::add`]. The caller's transaction is not rolled back here.
    pub async fn add_in(&self, writer: &Writer<'_>, row: &S::Row) -> Result<S::Row> {
        let rows = self
            .insert_in(writer, std::slice::from_ref(row), &Projection::new())
            .await?;
        map_one(&rows, S::TABLE_NAME)
    }

    /// Inserts rows inside an open write scope.
    ///
    /// # Errors
    ///
    /// See [`Store::add_many`].
    pub async fn add_many_in(
        &self,
        writer: &Writer<'_>,
        rows: &[S::Row],
    ) -> Result<Vec<S::Row>> {
        let rows = self.insert_in(writer, rows, &Projection::new()).await?;
        map_many(&rows)
    }

    /// Returns every matching row that maps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Usage`] for an invalid projection, or any
    /// engine error.
    pub async fn get(&self, lookup: &Lookup) -> Result<Vec<S::Row>> {
        let rows = self.fetch(&Self::get_rows_query(lookup)?).await?;
        map_many(&rows)
    }

    /// Returns the first matching row that maps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when there is none, or see
    /// [`Store::get`].
    pub async fn get_one(&self, lookup: &Lookup) -> Result<S::Row> {
        let rows = self.fetch(&Self::get_rows_query(lookup)?).await?;
        map_one(&rows, lookup.projection.table_for::<S>())
    }

    /// Returns the first matching row that maps, if any.
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub async fn get_one_or_none(&self, lookup: &Lookup) -> Result<Option<S::Row>> {
        let rows = self.fetch(&Self::get_rows_query(lookup)?).await?;
        map_one_or_none(&rows)
    }

    /// Returns the most recently inserted row, if it matches `lookup`.
    ///
    /// A `rowid` filter in `lookup` replaces the last-insert filter.
    ///
    /// # Errors
    ///
    /// See [`Store::get`].
    pub async fn get_last(&self, lookup: &Lookup) -> Result<Option<S::Row>> {
        let mut query = Self::get_rows_query(lookup)?;
        if !lookup.filters.contains_key(ROWID) {
            let table = Table::new(lookup.projection.table_for::<S>());
            query.query = query
                .query
                .where_(table.field(ROWID).eq(last_insert_rowid()))?;
        }
        let rows = self.fetch(&query).await?;
        map_one_or_none(&rows)
    }

    /// Runs any query and maps the rows into `T`, skipping rows that do
    /// not fit.
    ///
    /// # Errors
    ///
    /// Returns any engine or binding error.
    pub async fn select_as<T: Row, Q: ToSql>(
        &self,
        query: &QueryWithParameters<Q>,
    ) -> Result<Vec<T>> {
        let rows = self.fetch(query).await?;
        map_many(&rows)
    }

    async fn fetch<Q: ToSql>(&self, query: &QueryWithParameters<Q>) -> Result<Vec<SqliteRow>> {
        let reader = self.db.reader().await?;
        let mut conn = reader.connection().await?;
        fetch_rows(&mut conn, query).await
    }

    async fn insert(&self, rows: &[S::Row], projection: &Projection) -> Result<Vec<SqliteRow>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let query = Self::create_row_query(rows, projection)?;
        let writer = self.db.writer().await?;
        let result = fetch_in(&writer, &query).await;
        let rows = writer.finish(result).await?;
        debug!(table = S::TABLE_NAME, returned = rows.len(), "Inserted rows");
        Ok(rows)
    }

    async fn insert_in(
        &self,
        writer: &Writer<'_>,
        rows: &[S::Row],
        projection: &Projection,
    ) -> Result<Vec<SqliteRow>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let query = Self::create_row_query(rows, projection)?;
        let nested = writer.nested();
        let result = fetch_in(&nested, &query).await;
        nested.finish(result).await
    }
}

/// Adds one `column = :placeholder` predicate per filter and binds the
/// values.
///
/// Columns that are not plain identifiers get a positional placeholder.
///
/// # Errors
///
/// Returns [`StoreError::Query`] when a predicate cannot be added.
pub fn where_equal(
    mut query: SqliteQueryBuilder,
    table: &Table,
    filters: &Parameters,
) -> Result<QueryWithParameters<SqliteQueryBuilder>> {
    let mut parameters = Parameters::new();
    for (position, (column, value)) in filters.iter().enumerate() {
        let key = if is_placeholder_name(column) {
            column.clone()
        } else {
            let mut key = format!("_{position}");
            while filters.contains_key(&key) {
                key.push('_');
            }
            key
        };
        query = query.where_(table.field(column.as_str()).eq(Parameter::new(key.as_str())))?;
        parameters.insert(key, value.clone());
    }
    Ok(QueryWithParameters::new(query, parameters))
}

fn insert_key(column: &str, position: usize, row: usize) -> String {
    if is_placeholder_name(column) {
        format!("{column}_{row}")
    } else {
        // Named keys end in a digit, so this form never collides with them.
        format!("_{position}_{row}_")
    }
}

async fn fetch_in<Q: ToSql>(
    writer: &Writer<'_>,
    query: &QueryWithParameters<Q>,
) -> Result<Vec<SqliteRow>> {
    let mut conn = writer.connection().await?;
    fetch_rows(&mut conn, query).await
}

/// Failures are logged by [`execute_raw`] with the statement text.
async fn run_ddl(writer: &Writer<'_>, statements: &[&str]) -> Result<()> {
    let mut conn = writer.connection().await?;
    for sql in statements {
        execute_raw(&mut conn, sql).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rowkeep_core::builder::SqlValue;
    use rowkeep_core::error::RowError;
    use rowkeep_core::row::Record;
    use rowkeep_sqlite::SqliteDialect;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    impl Row for User {
        const COLUMNS: &'static [&'static str] = &["id", "name"];

        fn to_record(&self) -> Record {
            Record::new().with("id", self.id).with("name", self.name.clone())
        }

        fn from_record(record: &Record) -> std::result::Result<Self, RowError> {
            Ok(Self {
                id: record.decode("id")?,
                name: record.decode("name")?,
            })
        }
    }

    struct Users;

    impl Schema for Users {
        type Row = User;
        const TABLE_NAME: &'static str = "users";
        const ON_CONFLICT: OnConflict = OnConflict::DoUpdate;
    }

    struct Ids;

    #[derive(Debug, Clone, PartialEq)]
    struct Id {
        id: i64,
    }

    impl Row for Id {
        const COLUMNS: &'static [&'static str] = &["id"];

        fn to_record(&self) -> Record {
            Record::new().with("id", self.id)
        }

        fn from_record(record: &Record) -> std::result::Result<Self, RowError> {
            Ok(Self {
                id: record.decode("id")?,
            })
        }
    }

    impl Schema for Ids {
        type Row = Id;
        const TABLE_NAME: &'static str = "ids";
        const ON_CONFLICT: OnConflict = OnConflict::DoUpdate;
    }

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            name: String::from(name),
        }
    }

    #[test]
    fn test_create_row_query_keys_parameters_by_row() {
        let rows = [user(1, "a"), user(2, "b")];
        let query = Store::<Users>::create_row_query(&rows, &Projection::new()).unwrap();

        assert_eq!(
            query.sql(&SqliteDialect).unwrap(),
            r#"INSERT INTO "users" ("id", "name") VALUES (:id_0, :name_0), (:id_1, :name_1) ON CONFLICT ("id") DO UPDATE SET "name"=EXCLUDED."name" RETURNING "id", "name""#
        );
        assert_eq!(query.parameters.len(), 4);
        assert_eq!(
            query.parameters.get("name_1"),
            Some(&SqlValue::Text(String::from("b")))
        );
    }

    #[test]
    fn test_key_only_row_falls_back_to_do_nothing() {
        let query = Store::<Ids>::create_row_query(&[Id { id: 1 }], &Projection::new()).unwrap();
        let sql = query.sql(&SqliteDialect).unwrap();
        assert!(sql.contains(r#"ON CONFLICT ("id") DO NOTHING"#));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        id: i64,
        first_name: String,
    }

    impl Row for Person {
        const COLUMNS: &'static [&'static str] = &["id", "first name"];

        fn to_record(&self) -> Record {
            Record::new()
                .with("id", self.id)
                .with("first name", self.first_name.clone())
        }

        fn from_record(record: &Record) -> std::result::Result<Self, RowError> {
            Ok(Self {
                id: record.decode("id")?,
                first_name: record.decode("first name")?,
            })
        }
    }

    struct People;

    impl Schema for People {
        type Row = Person;
        const TABLE_NAME: &'static str = "people";
        const ON_CONFLICT: OnConflict = OnConflict::DoNothing;
    }

    #[test]
    fn test_quoted_column_names_bind_by_position() {
        let rows = [Person {
            id: 1,
            first_name: String::from("Ada"),
        }];
        let insert = Store::<People>::create_row_query(&rows, &Projection::new()).unwrap();
        let prepared = insert.prepare(&SqliteDialect).unwrap();
        assert!(prepared
            .sql
            .starts_with(r#"INSERT INTO "people" ("id", "first name") VALUES (?1, ?2)"#));
        assert_eq!(
            prepared.values,
            vec![SqlValue::Int(1), SqlValue::Text(String::from("Ada"))]
        );

        let lookup = Lookup::new().filter("first name", "Ada");
        let select = Store::<People>::get_rows_query(&lookup).unwrap();
        assert_eq!(
            select.query.to_sql(&SqliteDialect).unwrap(),
            r#"SELECT "id", "first name" FROM "people" WHERE "first name" = :_0"#
        );
        let prepared = select.prepare(&SqliteDialect).unwrap();
        assert_eq!(prepared.values, vec![SqlValue::Text(String::from("Ada"))]);
    }

    #[test]
    fn test_get_rows_query_binds_filters() {
        let lookup = Lookup::new().filter("name", "a").filter("id", 1_i64);
        let query = Store::<Users>::get_rows_query(&lookup).unwrap();

        assert_eq!(
            query.query.to_sql(&SqliteDialect).unwrap(),
            r#"SELECT "id", "name" FROM "users" WHERE "id" = :id AND "name" = :name"#
        );
        let prepared = query.prepare(&SqliteDialect).unwrap();
        assert_eq!(
            prepared.sql,
            r#"SELECT "id", "name" FROM "users" WHERE "id" = ?1 AND "name" = ?2"#
        );
        assert_eq!(
            prepared.values,
            vec![SqlValue::Int(1), SqlValue::Text(String::from("a"))]
        );
    }

    #[test]
    fn test_columns_without_table_is_usage_error() {
        let lookup = Lookup::new().projection(Projection::new().columns(["id"]));
        assert!(matches!(
            Store::<Users>::get_rows_query(&lookup),
            Err(StoreError::Usage(_))
        ));
    }

    #[test]
    fn test_projection_overrides_table_and_columns() {
        let lookup =
            Lookup::new().projection(Projection::new().table("archived_users").columns(["id"]));
        let query = Store::<Users>::get_rows_query(&lookup).unwrap();
        assert_eq!(
            query.sql(&SqliteDialect).unwrap(),
            r#"SELECT "id" FROM "archived_users""#
        );
    }

    #[test]
    fn test_helpers() {
        assert_eq!(Store::<Users>::column_names(), &["id", "name"]);
        assert_eq!(Store::<Users>::columns()[1].name(), "name");

        let aliased = Store::<Users>::aliased_query(
            Store::<Users>::query_builder().select([field("id")]).from_("users"),
            "ids",
            ["id"],
        );
        assert_eq!(Store::<Users>::table_from_aliased_query(&aliased).name(), "ids");
    }
}
