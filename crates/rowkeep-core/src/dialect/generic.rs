//! Generic SQL dialect.

use super::Dialect;

/// A generic SQL dialect using ANSI SQL standards.
///
/// It renders the portable subset: no upsert and no RETURNING.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDialect;

impl GenericDialect {
    /// Creates a new generic dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_dialect() {
        let dialect = GenericDialect::new();
        assert_eq!(dialect.name(), "generic");
        assert_eq!(dialect.identifier_quote(), '"');
        assert_eq!(dialect.named_parameter("id_0"), ":id_0");
        assert_eq!(dialect.positional_parameter(3), "?3");
        assert!(!dialect.supports_returning());
        assert!(!dialect.supports_upsert());
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        let dialect = GenericDialect::new();
        assert_eq!(dialect.quote_identifier("users"), r#""users""#);
        assert_eq!(dialect.quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }
}
