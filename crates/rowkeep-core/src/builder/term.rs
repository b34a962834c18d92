//! Terms and criteria: the building blocks of every clause.
//!
//! Terms render against a [`RenderContext`] which carries the dialect's
//! quote character and whether fields should be table-qualified.

use std::ops::{Add, Div, Mul, Sub};

use super::value::{SqlValue, ToSqlValue};
use crate::dialect::Dialect;

/// Rendering options shared by every term of one statement.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// Target dialect.
    pub dialect: &'a dyn Dialect,
    /// Whether fields are prefixed with their table.
    pub with_namespace: bool,
}

impl<'a> RenderContext<'a> {
    /// Creates a context without namespaces.
    #[must_use]
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            with_namespace: false,
        }
    }

    /// Returns a copy with namespaces enabled or disabled.
    #[must_use]
    pub const fn namespaced(self, with_namespace: bool) -> Self {
        Self {
            dialect: self.dialect,
            with_namespace,
        }
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }
}

/// A table reference, optionally aliased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Table {
    name: String,
    alias: Option<String>,
}

impl Table {
    /// Creates a table reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Sets the alias.
    #[must_use]
    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the alias, if any.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The name other clauses use to refer to this table.
    #[must_use]
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Creates a field of this table.
    #[must_use]
    pub fn field(&self, name: impl Into<String>) -> Field {
        Field {
            name: name.into(),
            table: Some(self.clone()),
            alias: None,
        }
    }

    /// Creates `*` qualified by this table.
    #[must_use]
    pub fn star(&self) -> Term {
        Term::Star(Some(self.clone()))
    }

    /// Renders the table as it appears in FROM, JOIN or INTO.
    #[must_use]
    pub fn to_sql(&self, ctx: RenderContext<'_>) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", ctx.quote(&self.name), ctx.quote(alias)),
            None => ctx.quote(&self.name),
        }
    }
}

impl From<&str> for Table {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Table {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    table: Option<Table>,
    alias: Option<String>,
}

/// Creates an unqualified column reference.
#[must_use]
pub fn field(name: impl Into<String>) -> Field {
    Field::new(name)
}

impl Field {
    /// Creates an unqualified column reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            alias: None,
        }
    }

    /// Sets the alias used in SELECT and RETURNING lists.
    #[must_use]
    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the owning table, if qualified.
    #[must_use]
    pub const fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Returns the alias, if any.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Renders the bare reference, without its alias.
    #[must_use]
    pub fn to_sql(&self, ctx: RenderContext<'_>) -> String {
        match &self.table {
            Some(table) if ctx.with_namespace => {
                format!("{}.{}", ctx.quote(table.reference_name()), ctx.quote(&self.name))
            }
            _ => ctx.quote(&self.name),
        }
    }

    /// Creates an equality criterion.
    #[must_use]
    pub fn eq(self, other: impl Into<Term>) -> Criterion {
        Term::from(self).eq(other)
    }

    /// Creates an inequality criterion.
    #[must_use]
    pub fn ne(self, other: impl Into<Term>) -> Criterion {
        Term::from(self).ne(other)
    }

    /// Creates a less-than criterion.
    #[must_use]
    pub fn lt(self, other: impl Into<Term>) -> Criterion {
        Term::from(self).lt(other)
    }

    /// Creates a less-than-or-equal criterion.
    #[must_use]
    pub fn lte(self, other: impl Into<Term>) -> Criterion {
        Term::from(self).lte(other)
    }

    /// Creates a greater-than criterion.
    #[must_use]
    pub fn gt(self, other: impl Into<Term>) -> Criterion {
        Term::from(self).gt(other)
    }

    /// Creates a greater-than-or-equal criterion.
    #[must_use]
    pub fn gte(self, other: impl Into<Term>) -> Criterion {
        Term::from(self).gte(other)
    }

    /// Creates a LIKE criterion.
    #[must_use]
    pub fn like(self, pattern: impl Into<Term>) -> Criterion {
        Term::from(self).like(pattern)
    }

    /// Creates an IS NULL criterion.
    #[must_use]
    pub fn is_null(self) -> Criterion {
        Term::from(self).is_null()
    }

    /// Creates an IS NOT NULL criterion.
    #[must_use]
    pub fn is_not_null(self) -> Criterion {
        Term::from(self).is_not_null()
    }

    /// Creates an IN criterion.
    #[must_use]
    pub fn is_in<T: Into<Term>>(self, values: impl IntoIterator<Item = T>) -> Criterion {
        Term::from(self).is_in(values)
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A named placeholder, rendered as `:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter(String);

impl Parameter {
    /// Creates a placeholder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the placeholder name, without the leading colon.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// A function call.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    args: Vec<Term>,
    aggregate: bool,
}

impl Function {
    /// Creates a scalar function call.
    #[must_use]
    pub fn scalar(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            args,
            aggregate: false,
        }
    }

    /// Creates an aggregate function call.
    #[must_use]
    pub fn aggregate(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            args,
            aggregate: true,
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// `COUNT(term)`.
#[must_use]
pub fn count(term: impl Into<Term>) -> Term {
    Term::Function(Function::aggregate("COUNT", vec![term.into()]))
}

/// `COUNT(*)`.
#[must_use]
pub fn count_star() -> Term {
    Term::Function(Function::aggregate("COUNT", vec![Term::Star(None)]))
}

/// `SUM(term)`.
#[must_use]
pub fn sum(term: impl Into<Term>) -> Term {
    Term::Function(Function::aggregate("SUM", vec![term.into()]))
}

/// `MIN(term)`.
#[must_use]
pub fn min(term: impl Into<Term>) -> Term {
    Term::Function(Function::aggregate("MIN", vec![term.into()]))
}

/// `MAX(term)`.
#[must_use]
pub fn max(term: impl Into<Term>) -> Term {
    Term::Function(Function::aggregate("MAX", vec![term.into()]))
}

/// `AVG(term)`.
#[must_use]
pub fn avg(term: impl Into<Term>) -> Term {
    Term::Function(Function::aggregate("AVG", vec![term.into()]))
}

/// `COALESCE(terms...)`.
#[must_use]
pub fn coalesce<T: Into<Term>>(terms: impl IntoIterator<Item = T>) -> Term {
    Term::Function(Function::scalar(
        "COALESCE",
        terms.into_iter().map(Into::into).collect(),
    ))
}

/// `LOWER(term)`.
#[must_use]
pub fn lower(term: impl Into<Term>) -> Term {
    Term::Function(Function::scalar("LOWER", vec![term.into()]))
}

/// `UPPER(term)`.
#[must_use]
pub fn upper(term: impl Into<Term>) -> Term {
    Term::Function(Function::scalar("UPPER", vec![term.into()]))
}

/// `LAST_INSERT_ROWID()`.
#[must_use]
pub fn last_insert_rowid() -> Term {
    Term::Function(Function::scalar("LAST_INSERT_ROWID", vec![]))
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl ArithmeticOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// Anything that can appear where SQL expects a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A column reference.
    Field(Field),
    /// `*`, optionally qualified.
    Star(Option<Table>),
    /// A named placeholder.
    Parameter(Parameter),
    /// An inline literal.
    Value(SqlValue),
    /// A function call.
    Function(Function),
    /// A binary arithmetic expression.
    Arithmetic(Box<Term>, ArithmeticOp, Box<Term>),
    /// A raw SQL fragment.
    ///
    /// **Warning**: Only use this for SQL fragments that don't contain user input.
    Raw(String),
    /// A term with an output alias.
    Aliased(Box<Term>, String),
}

impl Term {
    /// Creates a raw SQL fragment.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Creates an unqualified `*`.
    #[must_use]
    pub const fn star() -> Self {
        Self::Star(None)
    }

    /// Creates a named placeholder.
    #[must_use]
    pub fn param(name: impl Into<String>) -> Self {
        Self::Parameter(Parameter::new(name))
    }

    /// Sets the output alias.
    #[must_use]
    pub fn as_(self, alias: impl Into<String>) -> Self {
        match self {
            Self::Field(field) => Self::Field(field.as_(alias)),
            Self::Aliased(inner, _) => Self::Aliased(inner, alias.into()),
            other => Self::Aliased(Box::new(other), alias.into()),
        }
    }

    /// Returns the output alias, if any.
    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        match self {
            Self::Field(field) => field.alias(),
            Self::Aliased(_, alias) => Some(alias),
            _ => None,
        }
    }

    /// Returns every field this term references.
    #[must_use]
    pub fn fields(&self) -> Vec<&Field> {
        let mut out = vec![];
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a Field>) {
        match self {
            Self::Field(field) => out.push(field),
            Self::Function(function) => {
                for arg in &function.args {
                    arg.collect_fields(out);
                }
            }
            Self::Arithmetic(left, _, right) => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Self::Aliased(inner, _) => inner.collect_fields(out),
            Self::Star(_) | Self::Parameter(_) | Self::Value(_) | Self::Raw(_) => {}
        }
    }

    /// Returns every table this term references.
    #[must_use]
    pub fn tables(&self) -> Vec<&Table> {
        let mut out: Vec<&Table> = self.fields().into_iter().filter_map(Field::table).collect();
        self.collect_star_tables(&mut out);
        out
    }

    fn collect_star_tables<'a>(&'a self, out: &mut Vec<&'a Table>) {
        match self {
            Self::Star(Some(table)) => out.push(table),
            Self::Function(function) => {
                for arg in &function.args {
                    arg.collect_star_tables(out);
                }
            }
            Self::Arithmetic(left, _, right) => {
                left.collect_star_tables(out);
                right.collect_star_tables(out);
            }
            Self::Aliased(inner, _) => inner.collect_star_tables(out),
            _ => {}
        }
    }

    /// Returns whether the term contains an aggregate function.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        match self {
            Self::Function(function) => {
                function.aggregate || function.args.iter().any(Self::is_aggregate)
            }
            Self::Arithmetic(left, _, right) => left.is_aggregate() || right.is_aggregate(),
            Self::Aliased(inner, _) => inner.is_aggregate(),
            _ => false,
        }
    }

    /// Renders the term without its alias.
    #[must_use]
    pub fn to_sql(&self, ctx: RenderContext<'_>) -> String {
        match self {
            Self::Field(field) => field.to_sql(ctx),
            Self::Star(Some(table)) if ctx.with_namespace => {
                format!("{}.*", ctx.quote(table.reference_name()))
            }
            Self::Star(_) => String::from("*"),
            Self::Parameter(param) => ctx.dialect.named_parameter(param.name()),
            Self::Value(value) => value.to_sql_inline(),
            Self::Function(function) => {
                let args: Vec<String> = function.args.iter().map(|a| a.to_sql(ctx)).collect();
                format!("{}({})", function.name, args.join(", "))
            }
            Self::Arithmetic(left, op, right) => {
                format!(
                    "{} {} {}",
                    left.operand_sql(ctx),
                    op.as_str(),
                    right.operand_sql(ctx)
                )
            }
            Self::Raw(sql) => sql.clone(),
            Self::Aliased(inner, _) => inner.to_sql(ctx),
        }
    }

    /// Renders the term followed by `AS alias` when it has one.
    #[must_use]
    pub fn to_sql_aliased(&self, ctx: RenderContext<'_>) -> String {
        let sql = self.to_sql(ctx);
        match self.alias() {
            Some(alias) => format!("{sql} AS {}", ctx.quote(alias)),
            None => sql,
        }
    }

    fn operand_sql(&self, ctx: RenderContext<'_>) -> String {
        match self {
            Self::Arithmetic(..) => format!("({})", self.to_sql(ctx)),
            _ => self.to_sql(ctx),
        }
    }

    fn compare(self, op: CompareOp, other: impl Into<Term>) -> Criterion {
        Criterion::Compare(self, op, other.into())
    }

    /// Creates an equality criterion.
    #[must_use]
    pub fn eq(self, other: impl Into<Self>) -> Criterion {
        self.compare(CompareOp::Eq, other)
    }

    /// Creates an inequality criterion.
    #[must_use]
    pub fn ne(self, other: impl Into<Self>) -> Criterion {
        self.compare(CompareOp::Ne, other)
    }

    /// Creates a less-than criterion.
    #[must_use]
    pub fn lt(self, other: impl Into<Self>) -> Criterion {
        self.compare(CompareOp::Lt, other)
    }

    /// Creates a less-than-or-equal criterion.
    #[must_use]
    pub fn lte(self, other: impl Into<Self>) -> Criterion {
        self.compare(CompareOp::Lte, other)
    }

    /// Creates a greater-than criterion.
    #[must_use]
    pub fn gt(self, other: impl Into<Self>) -> Criterion {
        self.compare(CompareOp::Gt, other)
    }

    /// Creates a greater-than-or-equal criterion.
    #[must_use]
    pub fn gte(self, other: impl Into<Self>) -> Criterion {
        self.compare(CompareOp::Gte, other)
    }

    /// Creates a LIKE criterion.
    #[must_use]
    pub fn like(self, pattern: impl Into<Self>) -> Criterion {
        self.compare(CompareOp::Like, pattern)
    }

    /// Creates an IS NULL criterion.
    #[must_use]
    pub fn is_null(self) -> Criterion {
        Criterion::Null(self, false)
    }

    /// Creates an IS NOT NULL criterion.
    #[must_use]
    pub fn is_not_null(self) -> Criterion {
        Criterion::Null(self, true)
    }

    /// Creates an IN criterion.
    #[must_use]
    pub fn is_in<T: Into<Self>>(self, values: impl IntoIterator<Item = T>) -> Criterion {
        Criterion::In(self, values.into_iter().map(Into::into).collect())
    }
}

impl From<Field> for Term {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<&Field> for Term {
    fn from(field: &Field) -> Self {
        Self::Field(field.clone())
    }
}

impl From<Parameter> for Term {
    fn from(param: Parameter) -> Self {
        Self::Parameter(param)
    }
}

impl From<Function> for Term {
    fn from(function: Function) -> Self {
        Self::Function(function)
    }
}

impl<T: ToSqlValue> From<Option<T>> for Term {
    fn from(value: Option<T>) -> Self {
        Self::Value(value.to_sql_value())
    }
}

macro_rules! impl_term_from_value {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Term {
                fn from(value: $ty) -> Self {
                    Self::Value(value.to_sql_value())
                }
            }
        )+
    };
}

impl_term_from_value!(SqlValue, bool, i64, i32, i16, i8, u32, u16, u8, f64, f32, String, &str);

macro_rules! impl_arithmetic {
    ($($trait:ident, $method:ident, $op:expr);+ $(;)?) => {
        $(
            impl<R: Into<Term>> $trait<R> for Term {
                type Output = Term;

                fn $method(self, rhs: R) -> Term {
                    Term::Arithmetic(Box::new(self), $op, Box::new(rhs.into()))
                }
            }

            impl<R: Into<Term>> $trait<R> for Field {
                type Output = Term;

                fn $method(self, rhs: R) -> Term {
                    Term::from(self).$method(rhs)
                }
            }
        )+
    };
}

impl_arithmetic! {
    Add, add, ArithmeticOp::Add;
    Sub, sub, ArithmeticOp::Sub;
    Mul, mul, ArithmeticOp::Mul;
    Div, div, ArithmeticOp::Div;
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `LIKE`
    Like,
}

impl CompareOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// A boolean predicate for WHERE and ON clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Criterion {
    /// No predicate. Combining with it yields the other side.
    #[default]
    Empty,
    /// A binary comparison.
    Compare(Term, CompareOp, Term),
    /// `IS NULL` (false) or `IS NOT NULL` (true).
    Null(Term, bool),
    /// `IN (...)`.
    In(Term, Vec<Term>),
    /// Conjunction.
    And(Box<Criterion>, Box<Criterion>),
    /// Disjunction.
    Or(Box<Criterion>, Box<Criterion>),
    /// Negation.
    Not(Box<Criterion>),
    /// A raw SQL predicate.
    Raw(String),
}

impl Criterion {
    /// Creates a raw predicate.
    ///
    /// **Warning**: Only use this for SQL fragments that don't contain user input.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Returns whether this is the empty criterion.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Combines with AND.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Empty, other) => other,
            (this, Self::Empty) => this,
            (this, other) => Self::And(Box::new(this), Box::new(other)),
        }
    }

    /// Combines with OR.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Empty, other) => other,
            (this, Self::Empty) => this,
            (this, other) => Self::Or(Box::new(this), Box::new(other)),
        }
    }

    /// Negates the criterion.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            other => Self::Not(Box::new(other)),
        }
    }

    /// ANDs every criterion together.
    #[must_use]
    pub fn all(criteria: impl IntoIterator<Item = Self>) -> Self {
        criteria.into_iter().fold(Self::Empty, Self::and)
    }

    /// Renders the predicate. The empty criterion renders as an empty string.
    #[must_use]
    pub fn to_sql(&self, ctx: RenderContext<'_>) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Compare(left, op, right) => {
                format!("{} {} {}", left.to_sql(ctx), op.as_str(), right.to_sql(ctx))
            }
            Self::Null(term, negated) => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {keyword}", term.to_sql(ctx))
            }
            Self::In(term, values) => {
                let values: Vec<String> = values.iter().map(|v| v.to_sql(ctx)).collect();
                format!("{} IN ({})", term.to_sql(ctx), values.join(", "))
            }
            Self::And(left, right) => {
                format!("{} AND {}", left.nested_sql(ctx), right.nested_sql(ctx))
            }
            Self::Or(left, right) => {
                format!("{} OR {}", left.nested_sql(ctx), right.nested_sql(ctx))
            }
            Self::Not(inner) => format!("NOT ({})", inner.to_sql(ctx)),
            Self::Raw(sql) => sql.clone(),
        }
    }

    fn nested_sql(&self, ctx: RenderContext<'_>) -> String {
        match self {
            Self::Or(..) | Self::And(..) => format!("({})", self.to_sql(ctx)),
            _ => self.to_sql(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::GenericDialect;

    fn ctx() -> RenderContext<'static> {
        RenderContext::new(&GenericDialect)
    }

    #[test]
    fn test_field_quoting_and_namespace() {
        let users = Table::new("users");
        let name = users.field("name");
        assert_eq!(name.to_sql(ctx()), r#""name""#);
        assert_eq!(name.to_sql(ctx().namespaced(true)), r#""users"."name""#);

        let aliased = Table::new("users").as_("u");
        assert_eq!(
            aliased.field("id").to_sql(ctx().namespaced(true)),
            r#""u"."id""#
        );
        assert_eq!(aliased.to_sql(ctx()), r#""users" AS "u""#);
    }

    #[test]
    fn test_comparison_with_parameter() {
        let criterion = field("id").eq(Parameter::new("id"));
        assert_eq!(criterion.to_sql(ctx()), r#""id" = :id"#);
    }

    #[test]
    fn test_literal_is_escaped() {
        let criterion = field("name").eq("O'Brien");
        assert_eq!(criterion.to_sql(ctx()), r#""name" = 'O''Brien'"#);
    }

    #[test]
    fn test_criterion_combinators() {
        let c = Criterion::Empty
            .and(field("a").eq(1))
            .and(field("b").is_null())
            .and(Criterion::Empty);
        assert_eq!(c.to_sql(ctx()), r#""a" = 1 AND "b" IS NULL"#);

        let either = field("a").eq(1).or(field("a").eq(2)).and(field("c").is_not_null());
        assert_eq!(
            either.to_sql(ctx()),
            r#"("a" = 1 OR "a" = 2) AND "c" IS NOT NULL"#
        );

        let negated = field("a").is_in([1, 2, 3]).not();
        assert_eq!(negated.to_sql(ctx()), r#"NOT ("a" IN (1, 2, 3))"#);
    }

    #[test]
    fn test_empty_criterion_is_identity() {
        assert!(Criterion::all(Vec::new()).is_empty());
        assert!(Criterion::Empty.not().is_empty());
    }

    #[test]
    fn test_functions_and_aggregates() {
        assert!(count_star().is_aggregate());
        assert!(!lower(field("name")).is_aggregate());
        assert!((sum(field("n")) + 1).is_aggregate());
        assert_eq!(count_star().to_sql(ctx()), "COUNT(*)");
        assert_eq!(last_insert_rowid().to_sql(ctx()), "LAST_INSERT_ROWID()");
        assert_eq!(
            coalesce([Term::from(field("a")), Term::from(0)]).to_sql(ctx()),
            r#"COALESCE("a", 0)"#
        );
    }

    #[test]
    fn test_arithmetic_nesting() {
        let term = (field("a") + 1) * field("b");
        assert_eq!(term.to_sql(ctx()), r#"("a" + 1) * "b""#);
    }

    #[test]
    fn test_alias_rendering() {
        let term = Term::from(field("n")).as_("total");
        assert_eq!(term.to_sql_aliased(ctx()), r#""n" AS "total""#);
        let computed = (field("n") + 1).as_("next");
        assert_eq!(computed.to_sql_aliased(ctx()), r#""n" + 1 AS "next""#);
        assert_eq!(computed.to_sql(ctx()), r#""n" + 1"#);
    }

    #[test]
    fn test_referenced_tables() {
        let users = Table::new("users");
        let posts = Table::new("posts");
        let term = coalesce([users.field("a"), posts.field("b")]);
        let names: Vec<&str> = term.tables().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["users", "posts"]);
        assert_eq!(users.star().tables(), vec![&users]);
        assert!(Term::star().tables().is_empty());
    }
}
