//! Queries paired with their bound values.
//!
//! Builders render named placeholders (`:name`). Before execution,
//! [`QueryWithParameters::prepare`] rewrites them into numbered
//! placeholders and lists the values in bind order, checking that every
//! placeholder has a value and every value has a placeholder.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

use super::term::Table;
use super::value::SqlValue;
use crate::dialect::Dialect;
use crate::error::{QueryError, Result};

/// Bound values keyed by placeholder name.
pub type Parameters = BTreeMap<String, SqlValue>;

/// Anything that renders to a complete SQL statement.
pub trait ToSql {
    /// Renders the statement for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] when the statement is invalid or incomplete.
    fn to_sql(&self, dialect: &dyn Dialect) -> Result<String>;
}

impl<T: ToSql + ?Sized> ToSql for &T {
    fn to_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        (**self).to_sql(dialect)
    }
}

/// A raw SQL statement, such as a declared `CREATE TABLE`.
///
/// **Warning**: Only use this for SQL that doesn't contain user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSql(String);

impl RawSql {
    /// Wraps a raw statement.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    /// Returns the statement text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ToSql for RawSql {
    fn to_sql(&self, _dialect: &dyn Dialect) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// A statement ready for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    /// SQL with numbered placeholders.
    pub sql: String,
    /// Values in bind order.
    pub values: Vec<SqlValue>,
}

/// A query and the values for its named placeholders.
#[derive(Debug, Clone)]
pub struct QueryWithParameters<Q> {
    /// The query.
    pub query: Q,
    /// Values keyed by placeholder name.
    pub parameters: Parameters,
}

impl<Q> QueryWithParameters<Q> {
    /// Pairs a query with its values.
    #[must_use]
    pub const fn new(query: Q, parameters: Parameters) -> Self {
        Self { query, parameters }
    }

    /// Pairs a query that has no placeholders.
    #[must_use]
    pub const fn without_parameters(query: Q) -> Self {
        Self {
            query,
            parameters: Parameters::new(),
        }
    }

    /// Adds the values of another query, e.g. a CTE embedded in this one.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters.extend(parameters);
        self
    }
}

impl<Q: ToSql> QueryWithParameters<Q> {
    /// Renders the SQL with named placeholders.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] when the query cannot be rendered.
    pub fn sql(&self, dialect: &dyn Dialect) -> Result<String> {
        self.query.to_sql(dialect)
    }

    /// Renders the SQL and orders the values for binding.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MissingParameter`] or
    /// [`QueryError::UnusedParameter`] when placeholders and values do not
    /// match one-to-one, or any rendering error.
    pub fn prepare(&self, dialect: &dyn Dialect) -> Result<PreparedStatement> {
        let sql = self.sql(dialect)?;
        bind_named_parameters(&sql, &self.parameters, dialect)
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    // Quoted strings and identifiers are matched first so that their
    // contents are skipped.
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|:([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("Invalid placeholder regex")
});

/// Returns whether `name` can appear as a `:name` placeholder.
#[must_use]
pub fn is_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Rewrites `:name` placeholders in `sql` into numbered placeholders.
///
/// Each distinct name gets the number of its first appearance, so a name
/// used twice is bound once.
///
/// # Errors
///
/// Returns [`QueryError::MissingParameter`] for a placeholder without a
/// value and [`QueryError::UnusedParameter`] for a value without a
/// placeholder.
pub fn bind_named_parameters(
    sql: &str,
    parameters: &Parameters,
    dialect: &dyn Dialect,
) -> Result<PreparedStatement> {
    let mut order: Vec<String> = vec![];
    let rewritten = PLACEHOLDER.replace_all(sql, |caps: &Captures<'_>| {
        let Some(name) = caps.get(1) else {
            return caps[0].to_string();
        };
        let name = name.as_str();
        let index = match order.iter().position(|seen| seen == name) {
            Some(position) => position + 1,
            None => {
                order.push(String::from(name));
                order.len()
            }
        };
        dialect.positional_parameter(index)
    });

    let values = order
        .iter()
        .map(|name| {
            parameters
                .get(name)
                .cloned()
                .ok_or_else(|| QueryError::MissingParameter(name.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(unused) = parameters.keys().find(|key| !order.contains(key)) {
        return Err(QueryError::UnusedParameter(unused.clone()));
    }

    Ok(PreparedStatement {
        sql: rewritten.into_owned(),
        values,
    })
}

/// A named sub-query with an explicit column list, used as a CTE.
#[derive(Clone)]
pub struct AliasedQuery {
    name: String,
    columns: Vec<String>,
    query: Arc<dyn ToSql + Send + Sync>,
}

impl AliasedQuery {
    /// Names `query` and declares its output columns.
    pub fn new<C: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
        query: impl ToSql + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            query: Arc::new(query),
        }
    }

    /// Returns the CTE name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns a table reference to the CTE.
    #[must_use]
    pub fn table(&self) -> Table {
        Table::new(self.name.clone())
    }
}

impl ToSql for AliasedQuery {
    /// Renders `"name" ("col", ...) AS (<query>)`.
    fn to_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        let body = self.query.to_sql(dialect)?;
        let name = dialect.quote_identifier(&self.name);
        if self.columns.is_empty() {
            return Ok(format!("{name} AS ({body})"));
        }
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect();
        Ok(format!("{name} ({}) AS ({body})", columns.join(", ")))
    }
}

impl fmt::Debug for AliasedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliasedQuery")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// A CTE together with the values its placeholders need.
pub type AliasedQueryWithParameters = QueryWithParameters<AliasedQuery>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::GenericDialect;

    fn params(pairs: &[(&str, SqlValue)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (String::from(*k), v.clone()))
            .collect()
    }

    #[test]
    fn test_bind_order_follows_first_appearance() {
        let parameters = params(&[
            ("a", SqlValue::Int(1)),
            ("b", SqlValue::Int(2)),
        ]);
        let prepared =
            bind_named_parameters("SELECT :b, :a, :b", &parameters, &GenericDialect).unwrap();
        assert_eq!(prepared.sql, "SELECT ?1, ?2, ?1");
        assert_eq!(prepared.values, vec![SqlValue::Int(2), SqlValue::Int(1)]);
    }

    #[test]
    fn test_quoted_text_is_skipped() {
        let parameters = params(&[("id", SqlValue::Int(1))]);
        let prepared = bind_named_parameters(
            r#"SELECT '12:30', "odd:name" FROM t WHERE id = :id AND note = 'it''s :id'"#,
            &parameters,
            &GenericDialect,
        )
        .unwrap();
        assert_eq!(
            prepared.sql,
            r#"SELECT '12:30', "odd:name" FROM t WHERE id = ?1 AND note = 'it''s :id'"#
        );
        assert_eq!(prepared.values, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_placeholder_names() {
        assert!(is_placeholder_name("id_0"));
        assert!(is_placeholder_name("_private"));
        assert!(!is_placeholder_name("first name"));
        assert!(!is_placeholder_name("0th"));
        assert!(!is_placeholder_name(""));
    }

    #[test]
    fn test_missing_and_unused_parameters() {
        let empty = Parameters::new();
        assert_eq!(
            bind_named_parameters("SELECT :x", &empty, &GenericDialect),
            Err(QueryError::MissingParameter(String::from("x")))
        );
        let extra = params(&[("y", SqlValue::Null)]);
        assert_eq!(
            bind_named_parameters("SELECT 1", &extra, &GenericDialect),
            Err(QueryError::UnusedParameter(String::from("y")))
        );
    }

    #[test]
    fn test_raw_sql_renders_verbatim() {
        let ddl = RawSql::new("CREATE TABLE t (id INTEGER PRIMARY KEY)");
        let query = QueryWithParameters::without_parameters(ddl);
        let prepared = query.prepare(&GenericDialect).unwrap();
        assert_eq!(prepared.sql, "CREATE TABLE t (id INTEGER PRIMARY KEY)");
        assert!(prepared.values.is_empty());
    }

    #[test]
    fn test_aliased_query_renders_column_list() {
        let cte = AliasedQuery::new("counter", ["n"], RawSql::new("SELECT 1"));
        assert_eq!(
            cte.to_sql(&GenericDialect).unwrap(),
            r#""counter" ("n") AS (SELECT 1)"#
        );
        assert_eq!(cte.table().name(), "counter");
    }
}
