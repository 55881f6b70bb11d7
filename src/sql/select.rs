//! SELECT statement structure.
//!
//! The builder assembles these from a query; `to_sql()` serializes them
//! through the token stream for a concrete dialect. Table and derived-table
//! aliases are emitted without AS (Oracle rejects it); column aliases keep it.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::token::{Token, TokenStream};

/// An item in the SELECT projection list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: &str) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }
}

/// A table reference with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: None,
        }
    }

    pub fn aliased(table: &str, alias: &str) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: Some(alias.into()),
        }
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });
        if let Some(a) = &self.alias {
            ts.space().push(Token::Ident(a.clone()));
        }
        ts
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expr,
}

/// Sort direction in ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Desc,
        }
    }
}

/// A complete SELECT statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub projection: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub selection: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, expr: Expr) -> Self {
        self.projection.push(SelectExpr::new(expr));
        self
    }

    pub fn column_as(mut self, expr: Expr, alias: &str) -> Self {
        self.projection.push(SelectExpr::aliased(expr, alias));
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, kind: JoinKind, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join { kind, table, on });
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.selection = Some(expr);
        self
    }

    pub fn order_by(mut self, item: OrderByExpr) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Serialize to a single-line SQL string for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Select).space();
        if self.projection.is_empty() {
            ts.push(Token::Star);
        } else {
            for (i, item) in self.projection.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&item.expr.to_tokens_for_dialect(dialect));
                if let Some(alias) = &item.alias {
                    ts.space()
                        .push(Token::As)
                        .space()
                        .push(Token::Ident(alias.clone()));
                }
            }
        }

        if let Some(from) = &self.from {
            ts.space().push(Token::From).space().append(&from.to_tokens());
        }

        for join in &self.joins {
            ts.space();
            match join.kind {
                JoinKind::Inner => {
                    ts.push(Token::Inner);
                }
                JoinKind::Left => {
                    ts.push(Token::Left);
                }
            }
            ts.space()
                .push(Token::Join)
                .space()
                .append(&join.table.to_tokens())
                .space()
                .push(Token::On)
                .space()
                .append(&join.on.to_tokens_for_dialect(dialect));
        }

        if let Some(selection) = &self.selection {
            ts.space()
                .push(Token::Where)
                .space()
                .append(&selection.to_tokens_for_dialect(dialect));
        }

        if !self.order_by.is_empty() {
            ts.space().push(Token::OrderBy).space();
            for (i, item) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&item.expr.to_tokens_for_dialect(dialect));
                match item.direction {
                    SortDirection::Asc => ts.space().push(Token::Asc),
                    SortDirection::Desc => ts.space().push(Token::Desc),
                };
            }
        }

        if self.limit.is_some() || self.offset.is_some() {
            ts.space()
                .append(&dialect.emit_limit_offset(self.limit, self.offset));
        }

        ts
    }
}
