//! Expression AST - the boolean and scalar expressions the builder emits.
//!
//! A strongly-typed AST with exhaustive pattern matching enforced by the
//! compiler. The predicate tree of a query lowers into this before
//! serialization.

use crate::filter::{self, SpatialOperator};
use crate::geometry::Envelope;

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens_for_dialect()` - the
/// compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Literal values
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// IN: expr IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// BETWEEN: expr BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// Function call: name(args...)
    Function { name: String, args: Vec<Expr> },

    /// Bounding-box predicate; the dialect supplies the function shape.
    Bbox {
        column: Box<Expr>,
        op: SpatialOperator,
        envelope: Envelope,
        srid: i32,
    },

    /// Guarded raw subquery: `expr IN (SELECT sub.<id> FROM (<raw>) sub)`.
    ///
    /// Only the surrogate-id column of the raw fragment is projected
    /// outward, so an arbitrary fragment cannot leak columns into joins.
    IdSubquery {
        expr: Box<Expr>,
        select: String,
        id_column: String,
    },

    /// DISTINCT prefix inside an aggregate: COUNT(DISTINCT expr)
    Distinct(Box<Expr>),

    /// Wildcard: * (COUNT(*) only)
    Star,

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Literal values on the SQL side.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Timestamp(String),
    Null,
}

impl From<&filter::Literal> for Literal {
    fn from(lit: &filter::Literal) -> Self {
        match lit {
            filter::Literal::Null => Literal::Null,
            filter::Literal::Boolean(b) => Literal::Bool(*b),
            filter::Literal::Integer(i) => Literal::Int(*i),
            filter::Literal::Double(f) => Literal::Float(*f),
            filter::Literal::String(s) => Literal::String(s.clone()),
            filter::Literal::Timestamp(t) => Literal::Timestamp(t.clone()),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Like,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
}

// =============================================================================
// Constructors
// =============================================================================

/// Bare column reference.
pub fn col(column: &str) -> Expr {
    Expr::Column {
        table: None,
        column: column.into(),
    }
}

/// Table-qualified column reference.
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_int(i: i64) -> Expr {
    Expr::Literal(Literal::Int(i))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// COUNT(*)
pub fn count_star() -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![Expr::Star],
    }
}

/// The canonical always-false predicate: `1 = 0`.
pub fn always_false() -> Expr {
    lit_int(1).eq(lit_int(0))
}

/// Fluent combinators on expressions.
pub trait ExprExt: Sized {
    fn binary(self, op: BinaryOperator, right: Expr) -> Expr;

    fn eq(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, right)
    }
    fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Gt, right)
    }
    fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::And, right)
    }
    fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOperator::Or, right)
    }
}

impl ExprExt for Expr {
    fn binary(self, op: BinaryOperator, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }
}

// =============================================================================
// Serialization
// =============================================================================

impl BinaryOperator {
    fn token(&self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::Ne => Token::Ne,
            BinaryOperator::Lt => Token::Lt,
            BinaryOperator::Gt => Token::Gt,
            BinaryOperator::Lte => Token::Lte,
            BinaryOperator::Gte => Token::Gte,
            BinaryOperator::And => Token::And,
            BinaryOperator::Or => Token::Or,
            BinaryOperator::Like => Token::Like,
        }
    }
}

impl Literal {
    fn token(&self) -> Token {
        match self {
            Literal::Int(i) => Token::LitInt(*i),
            Literal::Float(f) => Token::LitFloat(*f),
            Literal::String(s) => Token::LitString(s.clone()),
            Literal::Bool(b) => Token::LitBool(*b),
            Literal::Timestamp(t) => Token::LitTimestamp(t.clone()),
            Literal::Null => Token::LitNull,
        }
    }
}

impl Expr {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone())).push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(lit.token());
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect))
                    .space()
                    .push(op.token())
                    .space()
                    .append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::UnaryOp { op, expr } => {
                match op {
                    UnaryOperator::Not => ts.push(Token::Not),
                };
                ts.space().append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect)).space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::In).space().lparen();
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&v.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Between { expr, low, high } => {
                ts.append(&expr.to_tokens_for_dialect(dialect))
                    .space()
                    .push(Token::Between)
                    .space()
                    .append(&low.to_tokens_for_dialect(dialect))
                    .space()
                    .push(Token::And)
                    .space()
                    .append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect)).space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Function { name, args } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&a.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Bbox {
                column,
                op,
                envelope,
                srid,
            } => {
                let column_ts = column.to_tokens_for_dialect(dialect);
                ts.append(&dialect.bbox_predicate(*op, &column_ts, envelope, *srid));
            }

            Expr::IdSubquery {
                expr,
                select,
                id_column,
            } => {
                // expr IN (SELECT sub.<id> FROM (<raw>) sub)
                // Table aliases are emitted without AS for Oracle's sake.
                ts.append(&expr.to_tokens_for_dialect(dialect))
                    .space()
                    .push(Token::In)
                    .space()
                    .lparen()
                    .push(Token::Select)
                    .space()
                    .push(Token::Ident("sub".into()))
                    .push(Token::Dot)
                    .push(Token::Ident(id_column.clone()))
                    .space()
                    .push(Token::From)
                    .space()
                    .lparen()
                    .push(Token::Raw(select.clone()))
                    .rparen()
                    .space()
                    .push(Token::Ident("sub".into()))
                    .rparen();
            }

            Expr::Distinct(inner) => {
                ts.push(Token::Distinct)
                    .space()
                    .append(&inner.to_tokens_for_dialect(dialect));
            }

            Expr::Star => {
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen()
                    .append(&inner.to_tokens_for_dialect(dialect))
                    .rparen();
            }
        }
        ts
    }
}
