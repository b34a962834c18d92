//! SQLite query builder: upsert, RETURNING and `WITH [RECURSIVE]`.
//!
//! ```rust
//! use rowkeep_core::builder::{Parameter, ToSql};
//! use rowkeep_sqlite::{SqliteDialect, SqliteQueryBuilder};
//!
//! # fn main() -> Result<(), rowkeep_core::QueryError> {
//! let sql = SqliteQueryBuilder::new()
//!     .into_table("users")
//!     .columns(["id", "name"])
//!     .insert([Parameter::new("id_0"), Parameter::new("name_0")])
//!     .on_conflict(["id"])?
//!     .do_update("name")?
//!     .returning(["id", "name"])?
//!     .to_sql(&SqliteDialect)?;
//!
//! assert_eq!(
//!     sql,
//!     r#"INSERT INTO "users" ("id", "name") VALUES (:id_0, :name_0) ON CONFLICT ("id") DO UPDATE SET "name"=EXCLUDED."name" RETURNING "id", "name""#
//! );
//! # Ok(())
//! # }
//! ```

mod conflict;

use rowkeep_core::builder::{
    AliasedQuery, Criterion, Field, Order, QueryBuilder, StatementKind, Table, Term, ToSql,
};
use rowkeep_core::dialect::Dialect;
use rowkeep_core::error::{QueryError, Result};

use crate::dialect::SqliteDialect;
use conflict::ConflictClause;

/// A term passed to [`SqliteQueryBuilder::returning`].
#[derive(Debug, Clone, PartialEq)]
pub enum Returning {
    /// A column name of the target table, or `*`.
    Name(String),
    /// A built term.
    Term(Term),
}

impl From<&str> for Returning {
    fn from(name: &str) -> Self {
        Self::Name(String::from(name))
    }
}

impl From<String> for Returning {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Field> for Returning {
    fn from(field: Field) -> Self {
        Self::Term(Term::Field(field))
    }
}

impl From<Term> for Returning {
    fn from(term: Term) -> Self {
        Self::Term(term)
    }
}

/// A SQLite query builder.
///
/// Wraps the generic [`QueryBuilder`] and adds the SQLite statement
/// extensions. Construction errors are returned as [`QueryError`] from the
/// method that introduced them.
#[derive(Debug, Clone, Default)]
pub struct SqliteQueryBuilder {
    base: QueryBuilder,
    recursive: bool,
    conflict: Option<ConflictClause>,
    returns: Vec<Term>,
    return_star: bool,
}

impl From<QueryBuilder> for SqliteQueryBuilder {
    fn from(base: QueryBuilder) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }
}

impl SqliteQueryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the generic builder underneath.
    #[must_use]
    pub const fn base(&self) -> &QueryBuilder {
        &self.base
    }

    fn map_base(mut self, f: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        self.base = f(self.base);
        self
    }

    /// Appends a CTE; `recursive` turns the whole clause into `WITH RECURSIVE`.
    #[must_use]
    pub fn with_aliased_query(mut self, query: AliasedQuery, recursive: bool) -> Self {
        self.recursive |= recursive;
        self.map_base(|base| base.with_(query))
    }

    /// Appends a non-recursive CTE.
    #[must_use]
    pub fn with_(self, query: AliasedQuery) -> Self {
        self.with_aliased_query(query, false)
    }

    /// Adds a table to FROM. Also names the DELETE target.
    #[must_use]
    pub fn from_(self, table: impl Into<Table>) -> Self {
        self.map_base(|base| base.from_(table))
    }

    /// Appends terms to the SELECT list.
    #[must_use]
    pub fn select<T: Into<Term>>(self, terms: impl IntoIterator<Item = T>) -> Self {
        self.map_base(|base| base.select(terms))
    }

    /// Makes the SELECT distinct.
    #[must_use]
    pub fn distinct(self) -> Self {
        self.map_base(QueryBuilder::distinct)
    }

    /// Adds an inner join.
    #[must_use]
    pub fn join(self, table: impl Into<Table>, on: Criterion) -> Self {
        self.map_base(|base| base.join(table, on))
    }

    /// Adds a left join.
    #[must_use]
    pub fn left_join(self, table: impl Into<Table>, on: Criterion) -> Self {
        self.map_base(|base| base.left_join(table, on))
    }

    /// Adds an ORDER BY term.
    #[must_use]
    pub fn order_by(self, term: impl Into<Term>, order: Order) -> Self {
        self.map_base(|base| base.order_by(term, order))
    }

    /// Sets LIMIT.
    #[must_use]
    pub fn limit(self, limit: u64) -> Self {
        self.map_base(|base| base.limit(limit))
    }

    /// Sets OFFSET.
    #[must_use]
    pub fn offset(self, offset: u64) -> Self {
        self.map_base(|base| base.offset(offset))
    }

    /// Appends `UNION <query>`.
    #[must_use]
    pub fn union(self, query: impl ToSql + Send + Sync + 'static) -> Self {
        self.map_base(|base| base.union(query))
    }

    /// Appends `UNION ALL <query>`.
    #[must_use]
    pub fn union_all(self, query: impl ToSql + Send + Sync + 'static) -> Self {
        self.map_base(|base| base.union_all(query))
    }

    /// Sets the INSERT target table.
    #[must_use]
    pub fn into_table(self, table: impl Into<Table>) -> Self {
        self.map_base(|base| base.into_table(table))
    }

    /// Appends INSERT columns.
    #[must_use]
    pub fn columns<F: Into<Field>>(self, columns: impl IntoIterator<Item = F>) -> Self {
        self.map_base(|base| base.columns(columns))
    }

    /// Appends one VALUES tuple.
    #[must_use]
    pub fn insert<T: Into<Term>>(self, values: impl IntoIterator<Item = T>) -> Self {
        self.map_base(|base| base.insert(values))
    }

    /// Sets the UPDATE target table.
    #[must_use]
    pub fn update(self, table: impl Into<Table>) -> Self {
        self.map_base(|base| base.update(table))
    }

    /// Appends an UPDATE assignment.
    #[must_use]
    pub fn set(self, field: impl Into<Field>, value: impl Into<Term>) -> Self {
        self.map_base(|base| base.set(field, value))
    }

    /// Turns the statement into a DELETE from the FROM table.
    #[must_use]
    pub fn delete(self) -> Self {
        self.map_base(QueryBuilder::delete)
    }

    /// Adds a predicate.
    ///
    /// Once `on_conflict` has been called, predicates scope the conflict
    /// target until an update action is declared, and the update after.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::WhereOnDoNothing`] after `do_nothing`, and
    /// [`QueryError::FieldlessConflictWhere`] when no conflict target exists.
    pub fn where_(mut self, criterion: Criterion) -> Result<Self> {
        match self.conflict.as_mut() {
            Some(conflict) => {
                conflict.add_where(criterion)?;
                Ok(self)
            }
            None => Ok(self.map_base(|base| base.where_(criterion))),
        }
    }

    /// Starts an `ON CONFLICT` clause on the given target columns.
    ///
    /// Column names are resolved against the INSERT table.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ConflictWithoutInsert`] when no INSERT table is set.
    pub fn on_conflict<F: Into<Field>>(
        mut self,
        fields: impl IntoIterator<Item = F>,
    ) -> Result<Self> {
        let Some(table) = self.base.insert_table().cloned() else {
            return Err(QueryError::ConflictWithoutInsert);
        };
        let targets = fields
            .into_iter()
            .map(|f| qualify(f.into(), &table))
            .collect::<Vec<_>>();
        self.conflict
            .get_or_insert_with(ConflictClause::default)
            .add_targets(targets);
        Ok(self)
    }

    /// Declares `DO NOTHING`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ActionWithoutConflict`] before `on_conflict`,
    /// and [`QueryError::TwoConflictHandlers`] after `do_update`.
    pub fn do_nothing(mut self) -> Result<Self> {
        self.conflict_mut()?.set_do_nothing()?;
        Ok(self)
    }

    /// Declares `DO UPDATE SET field = EXCLUDED.field`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ActionWithoutConflict`] before `on_conflict`,
    /// and [`QueryError::TwoConflictHandlers`] after `do_nothing`.
    pub fn do_update(self, field: impl Into<Field>) -> Result<Self> {
        self.push_update(field.into(), None)
    }

    /// Declares `DO UPDATE SET field = value`.
    ///
    /// # Errors
    ///
    /// Same as [`SqliteQueryBuilder::do_update`].
    pub fn do_update_value(self, field: impl Into<Field>, value: impl Into<Term>) -> Result<Self> {
        self.push_update(field.into(), Some(value.into()))
    }

    fn push_update(mut self, field: Field, value: Option<Term>) -> Result<Self> {
        let table = self.base.insert_table().cloned();
        let field = match table {
            Some(table) => qualify(field, &table),
            None => field,
        };
        self.conflict_mut()?.add_update(field, value)?;
        Ok(self)
    }

    fn conflict_mut(&mut self) -> Result<&mut ConflictClause> {
        self.conflict.as_mut().ok_or(QueryError::ActionWithoutConflict)
    }

    /// Adds RETURNING terms.
    ///
    /// Names resolve against the statement's target table and `"*"` means
    /// every column. Once `*` is returned, later column terms are absorbed.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::ReturningNotAllowed`] unless the statement is
    /// an INSERT, UPDATE or DELETE, [`QueryError::AggregateInReturning`] for
    /// aggregates and [`QueryError::ReturningForeignTable`] for a term that
    /// references a table the statement cannot see.
    pub fn returning<R: Into<Returning>>(
        mut self,
        terms: impl IntoIterator<Item = R>,
    ) -> Result<Self> {
        for term in terms {
            self.add_returning(term.into())?;
        }
        Ok(self)
    }

    fn add_returning(&mut self, returning: Returning) -> Result<()> {
        let target = self.target_table().cloned();
        let Some(target) = target else {
            return Err(QueryError::ReturningNotAllowed);
        };
        match returning {
            Returning::Name(name) if name == "*" => {
                self.set_returns_for_star();
                self.returns.push(Term::star());
                Ok(())
            }
            Returning::Name(name) => self.return_column(Term::Field(target.field(name))),
            Returning::Term(term @ (Term::Field(_) | Term::Star(_))) => self.return_column(term),
            Returning::Term(term) => {
                if term.is_aggregate() {
                    return Err(QueryError::AggregateInReturning);
                }
                self.validate_returning(&term)?;
                self.returns.push(term);
                Ok(())
            }
        }
    }

    fn return_column(&mut self, term: Term) -> Result<()> {
        if self.return_star {
            return Ok(());
        }
        self.validate_returning(&term)?;
        if matches!(term, Term::Star(_)) {
            self.set_returns_for_star();
        }
        self.returns.push(term);
        Ok(())
    }

    fn set_returns_for_star(&mut self) {
        self.returns
            .retain(|term| !matches!(term, Term::Field(_) | Term::Star(_)));
        self.return_star = true;
    }

    fn validate_returning(&self, term: &Term) -> Result<()> {
        let base = &self.base;
        for table in term.tables() {
            let visible = Some(table) == base.insert_table()
                || Some(table) == base.update_table()
                || base.from_tables().contains(table)
                || base.join_tables().any(|joined| joined == table);
            if !visible {
                return Err(QueryError::ReturningForeignTable(String::from(table.name())));
            }
        }
        Ok(())
    }

    fn target_table(&self) -> Option<&Table> {
        match self.base.kind() {
            StatementKind::Insert => self.base.insert_table(),
            StatementKind::Update => self.base.update_table(),
            StatementKind::Delete => self.base.from_tables().first(),
            StatementKind::Select => None,
        }
    }

    /// Renders the statement with the SQLite dialect.
    ///
    /// # Errors
    ///
    /// Returns any rendering error, e.g. [`QueryError::NoConflictHandler`].
    pub fn get_sql(&self) -> Result<String> {
        self.to_sql(&SqliteDialect)
    }
}

fn qualify(field: Field, table: &Table) -> Field {
    if field.table().is_some() {
        return field;
    }
    let mut qualified = table.field(field.name());
    if let Some(alias) = field.alias() {
        qualified = qualified.as_(alias);
    }
    qualified
}

impl ToSql for SqliteQueryBuilder {
    fn to_sql(&self, dialect: &dyn Dialect) -> Result<String> {
        let unsupported = |clause| QueryError::Unsupported {
            dialect: dialect.name(),
            clause,
        };
        if self.conflict.is_some() && !dialect.supports_upsert() {
            return Err(unsupported("ON CONFLICT"));
        }
        if !self.returns.is_empty() && !dialect.supports_returning() {
            return Err(unsupported("RETURNING"));
        }

        let ctx = self.base.render_context(dialect);
        let mut sql = self.base.render_with(dialect, self.recursive)?;
        sql.push_str(&self.base.render_statement(dialect)?);
        if let Some(conflict) = &self.conflict {
            sql.push_str(&conflict.to_sql(ctx)?);
        }
        if !self.returns.is_empty() {
            let terms: Vec<String> = self
                .returns
                .iter()
                .map(|t| t.to_sql_aliased(ctx))
                .collect();
            sql.push_str(&format!(" RETURNING {}", terms.join(", ")));
        }
        Ok(sql)
    }
}
