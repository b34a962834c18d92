//! Statement execution and row mapping.
//!
//! Queries are prepared with [`SqliteDialect`], so named placeholders reach
//! the engine as `?NNN` and values are bound in order. Failing statements
//! are logged with their SQL and parameters before the error is returned.

use std::any::type_name;

use rowkeep_core::builder::{PreparedStatement, QueryWithParameters, SqlValue, ToSql};
use rowkeep_core::error::RowError;
use rowkeep_core::result::{returns_result, BoxError};
use rowkeep_core::row::{Record, Row};
use rowkeep_sqlite::SqliteDialect;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::{debug, error};

use crate::error::{Result, StoreError};

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

/// Runs a query and returns every result row.
///
/// # Errors
///
/// Returns [`StoreError::Query`] when the query cannot be prepared and
/// [`StoreError::Database`] when the engine rejects it.
pub async fn fetch_rows<Q: ToSql>(
    conn: &mut SqliteConnection,
    query: &QueryWithParameters<Q>,
) -> Result<Vec<SqliteRow>> {
    let PreparedStatement { sql, values } = query.prepare(&SqliteDialect)?;
    debug!(sql = %sql, "Executing SQL");

    bind_values(sqlx::query(&sql), values)
        .fetch_all(conn)
        .await
        .map_err(|e| log_failure(&sql, query, e))
}

/// Runs a query and converts every result row into a [`Record`].
///
/// # Errors
///
/// Same as [`fetch_rows`], plus [`StoreError::Database`] for a value the
/// engine cannot decode.
pub async fn fetch_records<Q: ToSql>(
    conn: &mut SqliteConnection,
    query: &QueryWithParameters<Q>,
) -> Result<Vec<Record>> {
    let rows = fetch_rows(conn, query).await?;
    rows.iter()
        .map(|row| record_from_row(row, &[]).map_err(StoreError::from))
        .collect()
}

/// Runs a statement and returns the number of affected rows.
///
/// # Errors
///
/// Same as [`fetch_rows`].
pub async fn execute<Q: ToSql>(
    conn: &mut SqliteConnection,
    query: &QueryWithParameters<Q>,
) -> Result<u64> {
    let PreparedStatement { sql, values } = query.prepare(&SqliteDialect)?;
    debug!(sql = %sql, "Executing SQL");

    let result = bind_values(sqlx::query(&sql), values)
        .execute(conn)
        .await
        .map_err(|e| log_failure(&sql, query, e))?;
    Ok(result.rows_affected())
}

/// Runs SQL text that takes no parameters, such as DDL.
///
/// # Errors
///
/// Returns [`StoreError::Database`] when the engine rejects it.
pub async fn execute_raw(conn: &mut SqliteConnection, sql: &str) -> Result<u64> {
    debug!(sql = %sql, "Executing SQL");
    let result = sqlx::query(sql).execute(conn).await.map_err(|e| {
        error!(sql = %sql, error = %e, "Failed to execute SQL");
        StoreError::from(e)
    })?;
    Ok(result.rows_affected())
}

fn log_failure<Q>(sql: &str, query: &QueryWithParameters<Q>, e: sqlx::Error) -> StoreError {
    error!(
        sql = %sql,
        parameters = ?query.parameters,
        error = %e,
        "Failed to execute SQL"
    );
    StoreError::from(e)
}

fn bind_values(mut query: SqliteQuery<'_>, values: Vec<SqlValue>) -> SqliteQuery<'_> {
    for value in values {
        query = bind_value(query, value);
    }
    query
}

fn bind_value(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Int(i) => query.bind(i),
        SqlValue::Float(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Blob(b) => query.bind(b),
    }
}

/// Converts an engine row into a [`Record`].
///
/// Values keep their storage class. A column the engine reports without a
/// name takes the name in `declared` at the same position.
///
/// # Errors
///
/// Returns [`sqlx::Error::Decode`] for a value of unknown storage class.
pub fn record_from_row(row: &SqliteRow, declared: &[&str]) -> std::result::Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = match column.name() {
            "" => declared.get(index).copied().unwrap_or_default(),
            name => name,
        };
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            let storage_class = raw.type_info().name().to_owned();
            match storage_class.as_str() {
                "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked(index)?),
                "REAL" | "NUMERIC" => SqlValue::Float(row.try_get_unchecked(index)?),
                "TEXT" | "DATE" | "TIME" | "DATETIME" => {
                    SqlValue::Text(row.try_get_unchecked(index)?)
                }
                "BLOB" => SqlValue::Blob(row.try_get_unchecked(index)?),
                other => {
                    return Err(sqlx::Error::Decode(
                        format!("column '{name}' has unsupported storage class {other}").into(),
                    ));
                }
            }
        };
        record.insert(name, value);
    }
    Ok(record)
}

/// Maps one engine row into `R`.
///
/// The inner `Err` is a row that does not fit `R`; the outer one is a
/// value the engine could not decode.
///
/// # Errors
///
/// Returns [`StoreError::Internal`] for an undecodable value.
pub fn map_row<R: Row>(row: &SqliteRow) -> Result<std::result::Result<R, RowError>> {
    returns_result::<_, RowError>(|| -> std::result::Result<R, BoxError> {
        let record = record_from_row(row, R::COLUMNS)?;
        Ok(R::from_record(&record)?)
    })
    .map_err(StoreError::Internal)
}

/// Returns the first row that maps into `R`, if any.
///
/// # Errors
///
/// See [`map_row`].
pub fn map_one_or_none<R: Row>(rows: &[SqliteRow]) -> Result<Option<R>> {
    for row in rows {
        match map_row::<R>(row)? {
            Ok(mapped) => return Ok(Some(mapped)),
            Err(e) => debug!(row = type_name::<R>(), error = %e, "Skipping row"),
        }
    }
    Ok(None)
}

/// Returns the first row that maps into `R`.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] when no row maps, and see [`map_row`].
pub fn map_one<R: Row>(rows: &[SqliteRow], table: &str) -> Result<R> {
    map_one_or_none(rows)?.ok_or_else(|| StoreError::NotFound {
        row: type_name::<R>(),
        table: table.to_owned(),
    })
}

/// Returns every row that maps into `R`, skipping the rest.
///
/// # Errors
///
/// See [`map_row`].
pub fn map_many<R: Row>(rows: &[SqliteRow]) -> Result<Vec<R>> {
    let mut mapped = Vec::with_capacity(rows.len());
    for row in rows {
        match map_row::<R>(row)? {
            Ok(value) => mapped.push(value),
            Err(e) => debug!(row = type_name::<R>(), error = %e, "Skipping row"),
        }
    }
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use rowkeep_core::builder::{Parameter, Parameters, QueryBuilder, RawSql};
    use sqlx::Connection;

    use super::*;

    async fn connection() -> SqliteConnection {
        SqliteConnection::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_record_keeps_storage_classes() {
        let mut conn = connection().await;
        let query = QueryWithParameters::without_parameters(RawSql::new(
            "SELECT 1 AS i, 2.5 AS f, 'x' AS t, x'00ff' AS b, NULL AS n",
        ));
        let records = fetch_records(&mut conn, &query).await.unwrap();
        let record = &records[0];

        assert_eq!(record.get("i"), Some(&SqlValue::Int(1)));
        assert_eq!(record.get("f"), Some(&SqlValue::Float(2.5)));
        assert_eq!(record.get("t"), Some(&SqlValue::Text(String::from("x"))));
        assert_eq!(record.get("b"), Some(&SqlValue::Blob(vec![0x00, 0xff])));
        assert_eq!(record.get("n"), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_repeated_parameter_is_bound_once() {
        let mut conn = connection().await;
        let mut parameters = Parameters::new();
        parameters.insert(String::from("v"), SqlValue::Int(7));
        let query =
            QueryWithParameters::new(RawSql::new("SELECT :v AS a, :v + 1 AS b"), parameters);
        let records = fetch_records(&mut conn, &query).await.unwrap();

        assert_eq!(records[0].get("a"), Some(&SqlValue::Int(7)));
        assert_eq!(records[0].get("b"), Some(&SqlValue::Int(8)));
    }

    #[tokio::test]
    async fn test_missing_parameter_fails_before_execution() {
        let mut conn = connection().await;
        let query = QueryWithParameters::without_parameters(RawSql::new("SELECT :absent"));
        assert!(matches!(
            fetch_rows(&mut conn, &query).await,
            Err(StoreError::Query(_))
        ));
    }

    #[tokio::test]
    async fn test_engine_error_is_database_error() {
        let mut conn = connection().await;
        let query = QueryWithParameters::without_parameters(RawSql::new("SELECT * FROM nowhere"));
        assert!(matches!(
            execute(&mut conn, &query).await,
            Err(StoreError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_reports_affected_rows() {
        let mut conn = connection().await;
        execute_raw(&mut conn, "CREATE TABLE t (v INTEGER)").await.unwrap();

        let mut parameters = Parameters::new();
        parameters.insert(String::from("v"), SqlValue::Int(1));
        let insert = QueryBuilder::new()
            .into_table("t")
            .columns(["v"])
            .insert([Parameter::new("v")]);
        let affected = execute(&mut conn, &QueryWithParameters::new(insert, parameters))
            .await
            .unwrap();
        assert_eq!(affected, 1);
    }
}
