//! SQLite/SpatiaLite SQL dialect.
//!
//! Backs the embedded adapter used for tests and as the reference
//! implementation of the database contract. Mostly ANSI; spatial
//! predicates use SpatiaLite's BuildMbr.

use crate::filter::SpatialOperator;
use crate::geometry::Envelope;

use super::super::token::{Token, TokenStream};
use super::{helpers, SqlDialect};

/// SQLite/SpatiaLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    /// SQLite stores timestamps as text; no TIMESTAMP keyword.
    fn format_timestamp_literal(&self, ts: &str) -> String {
        helpers::quote_string_single(ts)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn bbox_predicate(
        &self,
        op: SpatialOperator,
        column: &TokenStream,
        envelope: &Envelope,
        srid: i32,
    ) -> TokenStream {
        let function = match op {
            SpatialOperator::BboxIntersects => "ST_Intersects",
            SpatialOperator::BboxContains => "ST_Contains",
            SpatialOperator::BboxWithin => "ST_Within",
        };

        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName(function.into()))
            .lparen()
            .append(column)
            .comma()
            .space()
            .push(Token::FunctionName("BuildMbr".into()))
            .lparen();
        helpers::push_ordinates(&mut ts, envelope.ordinates());
        ts.comma()
            .space()
            .push(Token::LitInt(srid as i64))
            .rparen()
            .rparen();
        ts
    }
}
