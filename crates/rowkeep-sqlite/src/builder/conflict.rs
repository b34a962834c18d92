//! `ON CONFLICT` clause state.

use rowkeep_core::builder::{Criterion, Field, RenderContext, Term};
use rowkeep_core::error::{QueryError, Result};

/// Accumulated upsert clause: targets, at most one action kind, and the
/// two predicate scopes.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConflictClause {
    fields: Vec<Field>,
    do_nothing: bool,
    do_updates: Vec<(Field, Option<Term>)>,
    wheres: Criterion,
    do_update_wheres: Criterion,
}

impl ConflictClause {
    pub(crate) fn add_targets(&mut self, fields: impl IntoIterator<Item = Field>) {
        self.fields.extend(fields);
    }

    pub(crate) fn set_do_nothing(&mut self) -> Result<()> {
        if !self.do_updates.is_empty() {
            return Err(QueryError::TwoConflictHandlers);
        }
        self.do_nothing = true;
        Ok(())
    }

    pub(crate) fn add_update(&mut self, field: Field, value: Option<Term>) -> Result<()> {
        if self.do_nothing {
            return Err(QueryError::TwoConflictHandlers);
        }
        self.do_updates.push((field, value));
        Ok(())
    }

    /// Routes a predicate to the target scope or the update scope.
    pub(crate) fn add_where(&mut self, criterion: Criterion) -> Result<()> {
        if criterion.is_empty() {
            return Ok(());
        }
        if self.do_nothing {
            return Err(QueryError::WhereOnDoNothing);
        }
        if self.fields.is_empty() {
            return Err(QueryError::FieldlessConflictWhere);
        }
        if self.do_updates.is_empty() {
            self.wheres = std::mem::take(&mut self.wheres).and(criterion);
        } else {
            self.do_update_wheres = std::mem::take(&mut self.do_update_wheres).and(criterion);
        }
        Ok(())
    }

    /// Renders ` ON CONFLICT ... DO ...` with a leading space.
    pub(crate) fn to_sql(&self, ctx: RenderContext<'_>) -> Result<String> {
        if !self.do_nothing && self.do_updates.is_empty() {
            return Err(QueryError::NoConflictHandler);
        }
        if !self.do_updates.is_empty() && self.fields.is_empty() {
            return Err(QueryError::FieldlessConflictUpdate);
        }

        let flat = ctx.namespaced(false);
        let mut sql = String::from(" ON CONFLICT");
        if !self.fields.is_empty() {
            let fields: Vec<String> = self.fields.iter().map(|f| f.to_sql(flat)).collect();
            sql.push_str(&format!(" ({})", fields.join(", ")));
        }
        if !self.wheres.is_empty() {
            sql.push_str(&format!(" WHERE {}", self.wheres.to_sql(flat)));
        }

        if self.do_nothing {
            sql.push_str(" DO NOTHING");
            return Ok(sql);
        }

        let qualified = ctx.namespaced(true);
        let updates: Vec<String> = self
            .do_updates
            .iter()
            .map(|(field, value)| {
                let column = field.to_sql(flat);
                match value {
                    Some(value) => format!("{column}={}", value.to_sql(qualified)),
                    None => format!("{column}=EXCLUDED.{column}"),
                }
            })
            .collect();
        sql.push_str(&format!(" DO UPDATE SET {}", updates.join(", ")));
        if !self.do_update_wheres.is_empty() {
            sql.push_str(&format!(" WHERE {}", self.do_update_wheres.to_sql(qualified)));
        }
        Ok(sql)
    }
}
