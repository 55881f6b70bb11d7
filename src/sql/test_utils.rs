//! SQL validation helpers for tests.
//!
//! Generated SQL is parsed with `sqlparser` to catch malformed output
//! (unbalanced parens, misplaced keywords, broken quoting) that string
//! assertions alone would miss.

use sqlparser::dialect::{GenericDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Parse SQL with the parser dialect matching ours; panics with a readable
/// message on failure. Test-only by convention.
pub fn validate_sql(sql: &str, dialect: Dialect) {
    let result = match dialect {
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
        // sqlparser has no Oracle dialect; the generic one accepts the
        // OFFSET/FETCH and function shapes we emit.
        Dialect::Oracle => Parser::parse_sql(&GenericDialect {}, sql),
        Dialect::Sqlite => Parser::parse_sql(&SQLiteDialect {}, sql),
    };

    if let Err(e) = result {
        panic!("Generated invalid SQL for {dialect}: {e}\n  SQL: {sql}");
    }
}
