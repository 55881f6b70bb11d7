//! Row-count paging filter.

use super::predicate::ComparisonOperator;
use super::{FilterError, FilterResult};

/// Where paging starts. The two modes are mutually exclusive: setting one
/// clears the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Zero-based row offset.
    Index(u64),
    /// Surrogate id the keyed-paging predicate compares against.
    Id(i64),
}

/// Limits a query to a window of rows.
///
/// Built either from one-based inclusive limits (`new(lower, upper)`) or
/// from a bare row count. Keyed paging (`set_start_id`) is preferred over
/// offset paging under concurrent writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterFilter {
    count: u64,
    start: Option<StartMode>,
    /// Operator for the keyed-paging predicate.
    operator: ComparisonOperator,
}

impl CounterFilter {
    /// Build from one-based inclusive row limits. Both must be strictly
    /// positive and lower must not exceed upper.
    pub fn new(lower: u64, upper: u64) -> FilterResult<Self> {
        if lower == 0 || upper == 0 {
            return Err(FilterError::NonPositiveLimit { lower, upper });
        }
        if lower > upper {
            return Err(FilterError::LimitOrder { lower, upper });
        }
        let mut filter = Self::with_count(upper - lower + 1)?;
        if lower > 1 {
            filter.set_start_index(lower - 1);
        }
        Ok(filter)
    }

    /// Build from a bare row count.
    pub fn with_count(count: u64) -> FilterResult<Self> {
        if count == 0 {
            return Err(FilterError::NonPositiveLimit {
                lower: count,
                upper: count,
            });
        }
        Ok(Self {
            count,
            start: None,
            operator: ComparisonOperator::Gt,
        })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Switch to offset paging; clears any start id.
    pub fn set_start_index(&mut self, index: u64) -> &mut Self {
        self.start = Some(StartMode::Index(index));
        self
    }

    /// Switch to keyed paging; clears any start index.
    pub fn set_start_id(&mut self, id: i64) -> &mut Self {
        self.start = Some(StartMode::Id(id));
        self
    }

    pub fn start_index(&self) -> Option<u64> {
        match self.start {
            Some(StartMode::Index(i)) => Some(i),
            _ => None,
        }
    }

    pub fn start_id(&self) -> Option<i64> {
        match self.start {
            Some(StartMode::Id(i)) => Some(i),
            _ => None,
        }
    }

    pub fn operator(&self) -> ComparisonOperator {
        self.operator
    }

    pub fn set_operator(&mut self, op: ComparisonOperator) -> &mut Self {
        self.operator = op;
        self
    }
}
