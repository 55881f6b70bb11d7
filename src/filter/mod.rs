//! The composable query/filter model.
//!
//! Filters are built by the host application (GUI or CLI) as a tree of
//! [`Predicate`]s plus projection, paging and sorting, aggregated into a
//! [`Query`]. Construction-time validation lives here; lowering to SQL lives
//! in [`crate::sql::builder`].

pub mod counter;
pub mod predicate;
pub mod projection;
pub mod query;
pub mod sort;

pub use counter::CounterFilter;
pub use predicate::{
    ComparisonOperator, ComparisonPredicate, Literal, LogicalOperator, LogicalPredicate, Operand,
    Predicate, RawSqlPredicate, ResourceIdPredicate, SpatialOperator, SpatialPredicate,
};
pub use projection::Projection;
pub use query::Query;
pub use sort::{SortOrder, SortProperty};

/// Errors raised while constructing filters. Caller errors: surfaced
/// immediately, never retried.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Counter filter limits must be strictly positive, got {lower}..{upper}")]
    NonPositiveLimit { lower: u64, upper: u64 },

    #[error("Counter filter lower limit {lower} exceeds upper limit {upper}")]
    LimitOrder { lower: u64, upper: u64 },

    #[error("Sort target {0} is not a simple attribute")]
    InvalidSortTarget(String),

    #[error("Literal {0} is not a finite number")]
    NonFiniteLiteral(f64),
}

pub type FilterResult<T> = Result<T, FilterError>;
