//! SQL dialect definitions and formatting rules.
//!
//! Target engines are PostgreSQL/PostGIS and Oracle Spatial; the embedded
//! SQLite/SpatiaLite dialect backs the in-tree adapter used for tests.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting (all three use ANSI `"`)
//! - Pagination: LIMIT/OFFSET vs OFFSET FETCH
//! - Boolean and timestamp literals
//! - Spatial predicate function shapes

mod oracle;
mod postgres;
mod sqlite;

pub mod helpers;

pub use oracle::Oracle;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use crate::filter::SpatialOperator;
use crate::geometry::Envelope;

use super::token::TokenStream;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format a timestamp literal from its ISO-8601 text form.
    fn format_timestamp_literal(&self, ts: &str) -> String {
        format!("TIMESTAMP {}", helpers::quote_string_single(ts))
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    // =========================================================================
    // Spatial Predicates
    // =========================================================================

    /// Emit the engine's bounding-box predicate over a rendered column.
    ///
    /// `column` is the already-rendered `alias.column` token stream the
    /// predicate tests; `srid` interprets the envelope's coordinates.
    fn bbox_predicate(
        &self,
        op: SpatialOperator,
        column: &TokenStream,
        envelope: &Envelope,
        srid: i32,
    ) -> TokenStream;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    Oracle,
    /// Embedded engine backing the in-tree adapter.
    Sqlite,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::Oracle => &Oracle,
            Dialect::Sqlite => &Sqlite,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        self.dialect().format_timestamp_literal(ts)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn bbox_predicate(
        &self,
        op: SpatialOperator,
        column: &TokenStream,
        envelope: &Envelope,
        srid: i32,
    ) -> TokenStream {
        self.dialect().bbox_predicate(op, column, envelope, srid)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
