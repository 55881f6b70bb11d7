//! DML statements - INSERT and UPDATE.
//!
//! The import pipeline emits these: INSERT for new feature rows and
//! UPDATE for the link-patching pass that rewrites deferred references.

use super::dialect::Dialect;
use super::expr::{Expr, Literal};
use super::token::{Token, TokenStream};

// =============================================================================
// INSERT
// =============================================================================

/// An INSERT statement built fluently:
///
/// ```
/// use citystore::sql::dml::Insert;
/// use citystore::sql::expr::Literal;
/// use citystore::sql::dialect::Dialect;
///
/// let stmt = Insert::into("building")
///     .column("gmlid", Literal::String("b1".into()))
///     .column("height", Literal::Float(12.5));
/// assert_eq!(
///     stmt.to_sql(Dialect::Postgres),
///     "INSERT INTO \"building\" (\"gmlid\", \"height\") VALUES ('b1', 12.5)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    columns: Vec<String>,
    values: Vec<Literal>,
}

impl Insert {
    pub fn into(table: &str) -> Self {
        Self {
            table: table.into(),
            columns: vec![],
            values: vec![],
        }
    }

    /// Add a column/value pair.
    pub fn column(mut self, column: &str, value: Literal) -> Self {
        self.columns.push(column.into());
        self.values.push(value);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Insert)
            .space()
            .push(Token::Into)
            .space()
            .push(Token::Ident(self.table.clone()))
            .space()
            .lparen();
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(c.clone()));
        }
        ts.rparen()
            .space()
            .push(Token::Values)
            .space()
            .lparen();
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(&Expr::Literal(v.clone()).to_tokens_for_dialect(dialect));
        }
        ts.rparen();
        ts
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// An UPDATE statement: `UPDATE table SET col = value, ... WHERE filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    assignments: Vec<(String, Literal)>,
    selection: Option<Expr>,
}

impl Update {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.into(),
            assignments: vec![],
            selection: None,
        }
    }

    pub fn set(mut self, column: &str, value: Literal) -> Self {
        self.assignments.push((column.into(), value));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.selection = Some(expr);
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Update)
            .space()
            .push(Token::Ident(self.table.clone()))
            .space()
            .push(Token::Set)
            .space();
        for (i, (column, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(column.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .append(&Expr::Literal(value.clone()).to_tokens_for_dialect(dialect));
        }
        if let Some(selection) = &self.selection {
            ts.space()
                .push(Token::Where)
                .space()
                .append(&selection.to_tokens_for_dialect(dialect));
        }
        ts
    }
}
