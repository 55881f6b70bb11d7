//! SQL generation.
//!
//! Queries lower through three layers:
//!
//! 1. [`builder`] resolves schema paths, allocates join aliases and
//!    translates the predicate tree into an expression AST,
//! 2. [`select`] and [`dml`] hold the statement structures,
//! 3. [`token`] serializes them through a [`dialect::SqlDialect`].
//!
//! Nothing below the builder knows about feature types; nothing above the
//! token stream knows about dialects.

pub mod builder;
pub mod dialect;
pub mod dml;
pub mod expr;
pub mod select;
pub mod token;

pub mod test_utils;

pub use builder::{BuildResult, QueryBuildError, QueryBuilder};
pub use dialect::{Dialect, SqlDialect};
pub use select::Select;
pub use token::{Token, TokenStream};
