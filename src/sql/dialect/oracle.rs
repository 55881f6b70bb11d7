//! Oracle Spatial SQL dialect.
//!
//! - ANSI identifier quoting (`"`)
//! - Numeric booleans (no SQL boolean type before 23c)
//! - OFFSET/FETCH pagination (12c+)
//! - SDO_RELATE masks over an SDO_GEOMETRY optimized rectangle

use crate::filter::SpatialOperator;
use crate::geometry::Envelope;

use super::super::token::{Token, TokenStream};
use super::{helpers, SqlDialect};

/// Oracle Spatial SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_fetch(limit, offset)
    }

    fn bbox_predicate(
        &self,
        op: SpatialOperator,
        column: &TokenStream,
        envelope: &Envelope,
        srid: i32,
    ) -> TokenStream {
        let mask = match op {
            SpatialOperator::BboxIntersects => "mask=ANYINTERACT",
            SpatialOperator::BboxContains => "mask=CONTAINS",
            SpatialOperator::BboxWithin => "mask=INSIDE",
        };

        // SDO_GEOMETRY(2003, srid, NULL, (1, 1003, 3), (x1, y1, x2, y2))
        // is the optimized-rectangle encoding of the envelope.
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("SDO_RELATE".into()))
            .lparen()
            .append(column)
            .comma()
            .space()
            .push(Token::FunctionName("SDO_GEOMETRY".into()))
            .lparen()
            .push(Token::LitInt(2003))
            .comma()
            .space()
            .push(Token::LitInt(srid as i64))
            .comma()
            .space()
            .push(Token::Null)
            .comma()
            .space()
            .push(Token::FunctionName("SDO_ELEM_INFO_ARRAY".into()))
            .lparen()
            .push(Token::LitInt(1))
            .comma()
            .space()
            .push(Token::LitInt(1003))
            .comma()
            .space()
            .push(Token::LitInt(3))
            .rparen()
            .comma()
            .space()
            .push(Token::FunctionName("SDO_ORDINATE_ARRAY".into()))
            .lparen();
        helpers::push_ordinates(&mut ts, envelope.ordinates());
        ts.rparen()
            .rparen()
            .comma()
            .space()
            .push(Token::LitString(mask.into()))
            .rparen()
            .space()
            .push(Token::Eq)
            .space()
            .push(Token::LitString("TRUE".into()));
        ts
    }
}
