//! PostgreSQL/PostGIS SQL dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - LIMIT/OFFSET pagination
//! - PostGIS spatial predicates over ST_MakeEnvelope

use crate::filter::SpatialOperator;
use crate::geometry::Envelope;

use super::super::token::{Token, TokenStream};
use super::{helpers, SqlDialect};

/// PostgreSQL/PostGIS SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
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
            .push(Token::FunctionName("ST_MakeEnvelope".into()))
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
