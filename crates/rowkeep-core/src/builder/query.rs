//! The dialect-agnostic query builder.
//!
//! One builder value accumulates the clauses of a SELECT, INSERT, UPDATE or
//! DELETE statement. Every method consumes the builder and returns the next
//! state, and clones own their clause lists, so branching a builder never
//! affects the original.
//!
//! ```rust
//! use rowkeep_core::builder::{field, Parameter, QueryBuilder, ToSql};
//! use rowkeep_core::dialect::GenericDialect;
//!
//! let sql = QueryBuilder::new()
//!     .from_("users")
//!     .select([field("id"), field("name")])
//!     .where_(field("id").eq(Parameter::new("id")))
//!     .to_sql(&GenericDialect)
//!     .unwrap();
//!
//! assert_eq!(sql, r#"SELECT "id", "name" FROM "users" WHERE "id" = :id"#);
//! ```

use std::fmt;
use std::sync::Arc;

use super::params::{AliasedQuery, ToSql};
use super::term::{Criterion, Field, RenderContext, Table, Term};
use crate::dialect::Dialect;
use crate::error::{QueryError, Result};

/// The statement a builder renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT.
    Select,
    /// INSERT.
    Insert,
    /// UPDATE.
    Update,
    /// DELETE.
    Delete,
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `JOIN`.
    Inner,
    /// `LEFT JOIN`.
    Left,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: Table,
    on: Criterion,
}

#[derive(Clone)]
struct Union {
    all: bool,
    query: Arc<dyn ToSql + Send + Sync>,
}

impl fmt::Debug for Union {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Union")
            .field("all", &self.all)
            .finish_non_exhaustive()
    }
}

/// A generic SQL builder.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    with: Vec<AliasedQuery>,
    select: Vec<Term>,
    distinct: bool,
    from: Vec<Table>,
    joins: Vec<Join>,
    wheres: Criterion,
    order_by: Vec<(Term, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    unions: Vec<Union>,
    insert_table: Option<Table>,
    columns: Vec<Field>,
    values: Vec<Vec<Term>>,
    update_table: Option<Table>,
    sets: Vec<(Field, Term)>,
    delete: bool,
}

impl QueryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a CTE to the WITH clause.
    #[must_use]
    pub fn with_(mut self, query: AliasedQuery) -> Self {
        self.with.push(query);
        self
    }

    /// Adds a table to FROM. Also names the DELETE target.
    #[must_use]
    pub fn from_(mut self, table: impl Into<Table>) -> Self {
        self.from.push(table.into());
        self
    }

    /// Appends terms to the SELECT list.
    #[must_use]
    pub fn select<T: Into<Term>>(mut self, terms: impl IntoIterator<Item = T>) -> Self {
        self.select.extend(terms.into_iter().map(Into::into));
        self
    }

    /// Makes the SELECT distinct.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Adds an inner join.
    #[must_use]
    pub fn join(mut self, table: impl Into<Table>, on: Criterion) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Inner,
            table: table.into(),
            on,
        });
        self
    }

    /// Adds a left join.
    #[must_use]
    pub fn left_join(mut self, table: impl Into<Table>, on: Criterion) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Left,
            table: table.into(),
            on,
        });
        self
    }

    /// Adds a predicate. Successive calls are ANDed; the empty criterion is ignored.
    #[must_use]
    pub fn where_(mut self, criterion: Criterion) -> Self {
        self.wheres = std::mem::take(&mut self.wheres).and(criterion);
        self
    }

    /// Adds an ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, term: impl Into<Term>, order: Order) -> Self {
        self.order_by.push((term.into(), order));
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets OFFSET.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Appends `UNION <query>`.
    #[must_use]
    pub fn union(mut self, query: impl ToSql + Send + Sync + 'static) -> Self {
        self.unions.push(Union {
            all: false,
            query: Arc::new(query),
        });
        self
    }

    /// Appends `UNION ALL <query>`.
    #[must_use]
    pub fn union_all(mut self, query: impl ToSql + Send + Sync + 'static) -> Self {
        self.unions.push(Union {
            all: true,
            query: Arc::new(query),
        });
        self
    }

    /// Sets the INSERT target table.
    #[must_use]
    pub fn into_table(mut self, table: impl Into<Table>) -> Self {
        self.insert_table = Some(table.into());
        self
    }

    /// Appends INSERT columns.
    #[must_use]
    pub fn columns<F: Into<Field>>(mut self, columns: impl IntoIterator<Item = F>) -> Self {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Appends one VALUES tuple.
    #[must_use]
    pub fn insert<T: Into<Term>>(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.values.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the UPDATE target table.
    #[must_use]
    pub fn update(mut self, table: impl Into<Table>) -> Self {
        self.update_table = Some(table.into());
        self
    }

    /// Appends an UPDATE assignment.
    #[must_use]
    pub fn set(mut self, field: impl Into<Field>, value: impl Into<Term>) -> Self {
        self.sets.push((field.into(), value.into()));
        self
    }

    /// Turns the statement into a DELETE from the FROM table.
    #[must_use]
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Returns the statement kind.
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        if self.insert_table.is_some() {
            StatementKind::Insert
        } else if self.update_table.is_some() {
            StatementKind::Update
        } else if self.delete {
            StatementKind::Delete
        } else {
            StatementKind::Select
        }
    }

    /// Returns the INSERT target.
    #[must_use]
    pub const fn insert_table(&self) -> Option<&Table> {
        self.insert_table.as_ref()
    }

    /// Returns the UPDATE target.
    #[must_use]
    pub const fn update_table(&self) -> Option<&Table> {
        self.update_table.as_ref()
    }

    /// Returns the FROM tables.
    #[must_use]
    pub fn from_tables(&self) -> &[Table] {
        &self.from
    }

    /// Returns the joined tables.
    pub fn join_tables(&self) -> impl Iterator<Item = &Table> {
        self.joins.iter().map(|j| &j.table)
    }

    /// Returns the CTEs.
    #[must_use]
    pub fn ctes(&self) -> &[AliasedQuery] {
        &self.with
    }

    /// Returns whether fields render table-qualified.
    #[must_use]
    pub fn with_namespace(&self) -> bool {
        !self.joins.is_empty()
            || self.from.len() > 1
            || (self.update_table.is_some() && !self.from.is_empty())
    }

    /// Returns the rendering context for terms of this statement.
    #[must_use]
    pub fn render_context<'a>(&self, dialect: &'a dyn Dialect) -> RenderContext<'a> {
        RenderContext::new(dialect).namespaced(self.with_namespace())
    }

    /// Renders the WITH clause with a trailing space, or nothing.
    ///
    /// # Errors
    ///
    /// Returns any error raised while rendering a CTE body.
    pub fn render_with(&self, dialect: &dyn Dialect, recursive: bool) -> Result<String> {
        if self.with.is_empty() {
            return Ok(String::new());
        }
        let ctes = self
            .with
            .iter()
            .map(|cte| cte.to_sql(dialect))
            .collect::<Result<Vec<_>>>()?;
        let keyword = if recursive { "WITH RECURSIVE" } else { "WITH" };
        Ok(format!("{keyword} {} ", ctes.join(", ")))
    }

    /// Renders the statement without its WITH clause.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Incomplete`] when a required clause is missing.
    pub fn render_statement(&self, dialect: &dyn Dialect) -> Result<String> {
        let ctx = self.render_context(dialect);
        match self.kind() {
            StatementKind::Select => self.render_select(ctx),
            StatementKind::Insert => self.render_insert(ctx),
            StatementKind::Update => self.render_update(ctx),
            StatementKind::Delete => self.render_delete(ctx),
        }
    }

    fn render_select(&self, ctx: RenderContext<'_>) -> Result<String> {
        if self.select.is_empty() {
            return Err(QueryError::Incomplete("SELECT has no terms"));
        }
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        let terms: Vec<String> = self.select.iter().map(|t| t.to_sql_aliased(ctx)).collect();
        sql.push_str(&terms.join(", "));
        self.push_from(&mut sql, ctx);
        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(" {keyword} {}", join.table.to_sql(ctx)));
            if !join.on.is_empty() {
                sql.push_str(&format!(" ON {}", join.on.to_sql(ctx)));
            }
        }
        self.push_where(&mut sql, ctx);
        for union in &self.unions {
            let keyword = if union.all { "UNION ALL" } else { "UNION" };
            sql.push_str(&format!(" {keyword} {}", union.query.to_sql(ctx.dialect)?));
        }
        if !self.order_by.is_empty() {
            let orders: Vec<String> = self
                .order_by
                .iter()
                .map(|(term, order)| {
                    let direction = match order {
                        Order::Asc => "ASC",
                        Order::Desc => "DESC",
                    };
                    format!("{} {direction}", term.to_sql(ctx))
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(sql)
    }

    fn render_insert(&self, ctx: RenderContext<'_>) -> Result<String> {
        let Some(table) = &self.insert_table else {
            return Err(QueryError::Incomplete("INSERT has no table"));
        };
        if self.values.is_empty() {
            return Err(QueryError::Incomplete("INSERT has no values"));
        }
        let flat = ctx.namespaced(false);
        let mut sql = format!("INSERT INTO {}", table.to_sql(flat));
        if !self.columns.is_empty() {
            let columns: Vec<String> = self.columns.iter().map(|c| c.to_sql(flat)).collect();
            sql.push_str(&format!(" ({})", columns.join(", ")));
        }
        let rows: Vec<String> = self
            .values
            .iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(|v| v.to_sql(flat)).collect();
                format!("({})", values.join(", "))
            })
            .collect();
        sql.push_str(&format!(" VALUES {}", rows.join(", ")));
        Ok(sql)
    }

    fn render_update(&self, ctx: RenderContext<'_>) -> Result<String> {
        let Some(table) = &self.update_table else {
            return Err(QueryError::Incomplete("UPDATE has no table"));
        };
        if self.sets.is_empty() {
            return Err(QueryError::Incomplete("UPDATE has no assignments"));
        }
        let assignments: Vec<String> = self
            .sets
            .iter()
            .map(|(field, value)| {
                format!("{} = {}", field.to_sql(ctx.namespaced(false)), value.to_sql(ctx))
            })
            .collect();
        let mut sql = format!("UPDATE {} SET {}", table.to_sql(ctx), assignments.join(", "));
        self.push_from(&mut sql, ctx);
        self.push_where(&mut sql, ctx);
        Ok(sql)
    }

    fn render_delete(&self, ctx: RenderContext<'_>) -> Result<String> {
        let [table] = self.from.as_slice() else {
            return Err(QueryError::Incomplete("DELETE needs exactly one table"));
        };
        let mut sql = format!("DELETE FROM {}", table.to_sql(ctx));
        self.push_where(&mut sql, ctx);
        Ok(sql)
    }

    fn push_from(&self, sql: &mut String, ctx: RenderContext<'_>) {
        if self.from.is_empty() {
            return;
        }
        let tables: Vec<String> = self.from.iter().map(|t| t.to_sql(ctx)).collect();
        sql.push_str(&format!(" FROM {}", tables.join(", ")));
    }

    fn push_where(&self, sql: &mut String, ctx: RenderContext<'_>) {
        if !self.wheres.is_empty() {
            sql.push_str(&format!(" WHERE {}", self.wheres.to_sql(ctx)));
        }
    }
}

impl ToSql for QueryBuilder {
    fn to_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        Ok(format!(
            "{}{}",
            self.render_with(dialect, false)?,
            self.render_statement(dialect)?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::term::{count_star, field, Parameter};
    use crate::dialect::GenericDialect;

    fn sql(query: &QueryBuilder) -> String {
        query.to_sql(&GenericDialect).unwrap()
    }

    #[test]
    fn test_select_with_filters() {
        let query = QueryBuilder::new()
            .from_("users")
            .select([field("id"), field("name")])
            .where_(field("id").eq(Parameter::new("id")))
            .where_(Criterion::Empty)
            .where_(field("name").eq(Parameter::new("name")));
        assert_eq!(
            sql(&query),
            r#"SELECT "id", "name" FROM "users" WHERE "id" = :id AND "name" = :name"#
        );
    }

    #[test]
    fn test_select_without_terms_is_incomplete() {
        let query = QueryBuilder::new().from_("users");
        assert_eq!(
            query.to_sql(&GenericDialect),
            Err(QueryError::Incomplete("SELECT has no terms"))
        );
    }

    #[test]
    fn test_join_enables_namespaces() {
        let users = Table::new("users");
        let posts = Table::new("posts");
        let query = QueryBuilder::new()
            .from_(users.clone())
            .join(posts.clone(), users.field("id").eq(posts.field("user_id")))
            .select([Term::from(users.field("name")), count_star().as_("n")])
            .order_by(users.field("name"), Order::Desc)
            .limit(10)
            .offset(5);
        assert_eq!(
            sql(&query),
            r#"SELECT "users"."name", COUNT(*) AS "n" FROM "users" JOIN "posts" ON "users"."id" = "posts"."user_id" ORDER BY "users"."name" DESC LIMIT 10 OFFSET 5"#
        );
    }

    #[test]
    fn test_multi_row_insert() {
        let query = QueryBuilder::new()
            .into_table("users")
            .columns(["id", "name"])
            .insert([Parameter::new("id_0"), Parameter::new("name_0")])
            .insert([Parameter::new("id_1"), Parameter::new("name_1")]);
        assert_eq!(
            sql(&query),
            r#"INSERT INTO "users" ("id", "name") VALUES (:id_0, :name_0), (:id_1, :name_1)"#
        );
        assert_eq!(query.kind(), StatementKind::Insert);
    }

    #[test]
    fn test_insert_without_values_is_incomplete() {
        let query = QueryBuilder::new().into_table("users").columns(["id"]);
        assert_eq!(
            query.to_sql(&GenericDialect),
            Err(QueryError::Incomplete("INSERT has no values"))
        );
    }

    #[test]
    fn test_update_and_delete() {
        let update = QueryBuilder::new()
            .update("users")
            .set("name", Parameter::new("name"))
            .where_(field("id").eq(1));
        assert_eq!(
            sql(&update),
            r#"UPDATE "users" SET "name" = :name WHERE "id" = 1"#
        );

        let delete = QueryBuilder::new()
            .from_("users")
            .delete()
            .where_(field("id").eq(1));
        assert_eq!(sql(&delete), r#"DELETE FROM "users" WHERE "id" = 1"#);
        assert_eq!(delete.kind(), StatementKind::Delete);
    }

    #[test]
    fn test_update_from_is_namespaced() {
        let users = Table::new("users");
        let renames = Table::new("renames");
        let update = QueryBuilder::new()
            .update(users.clone())
            .set("name", renames.field("name"))
            .from_(renames.clone())
            .where_(users.field("id").eq(renames.field("id")));
        assert_eq!(
            sql(&update),
            r#"UPDATE "users" SET "name" = "renames"."name" FROM "renames" WHERE "users"."id" = "renames"."id""#
        );
    }

    #[test]
    fn test_with_clause_and_union() {
        let seed = QueryBuilder::new().select([Term::from(1)]);
        let step = QueryBuilder::new()
            .from_("counter")
            .select([field("n") + 1])
            .where_(field("n").lt(3));
        let cte = AliasedQuery::new("counter", ["n"], seed.union_all(step));
        let query = QueryBuilder::new()
            .with_(cte.clone())
            .from_(cte.table())
            .select([field("n")]);
        assert_eq!(
            query.render_with(&GenericDialect, true).unwrap(),
            r#"WITH RECURSIVE "counter" ("n") AS (SELECT 1 UNION ALL SELECT "n" + 1 FROM "counter" WHERE "n" < 3) "#
        );
        assert_eq!(
            sql(&query),
            r#"WITH "counter" ("n") AS (SELECT 1 UNION ALL SELECT "n" + 1 FROM "counter" WHERE "n" < 3) SELECT "n" FROM "counter""#
        );
    }

    #[test]
    fn test_clones_do_not_share_state() {
        let base = QueryBuilder::new().from_("users").select([field("id")]);
        let branched = base.clone().select([field("name")]).where_(field("id").eq(1));
        assert_eq!(sql(&base), r#"SELECT "id" FROM "users""#);
        assert_eq!(
            sql(&branched),
            r#"SELECT "id", "name" FROM "users" WHERE "id" = 1"#
        );
    }
}
