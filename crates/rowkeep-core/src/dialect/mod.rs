//! SQL Dialect support.
//!
//! Dialects differ in identifier quoting, parameter syntax and in which
//! statement extensions they accept. Builders consult the dialect at
//! render time, so one builder value can be rendered for several targets.

mod generic;

pub use generic::GenericDialect;

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (e.g., `"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Renders a named placeholder as it appears in builder output.
    fn named_parameter(&self, name: &str) -> String {
        format!(":{name}")
    }

    /// Renders the placeholder bound to the 1-based `index` in engine SQL.
    fn positional_parameter(&self, index: usize) -> String {
        format!("?{index}")
    }

    /// Returns whether the dialect supports RETURNING clause.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Returns whether the dialect supports UPSERT (ON CONFLICT).
    fn supports_upsert(&self) -> bool {
        false
    }

    /// Quotes an identifier, doubling any embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }
}
