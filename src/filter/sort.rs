//! Sorting.

use crate::schema::ValueReference;

use super::{FilterError, FilterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One ORDER BY key. Only simple attributes may be sorted on.
#[derive(Debug, Clone, PartialEq)]
pub struct SortProperty {
    target: ValueReference,
    order: SortOrder,
}

impl SortProperty {
    pub fn new(target: ValueReference, order: SortOrder) -> FilterResult<Self> {
        if !target.is_simple_attribute() {
            return Err(FilterError::InvalidSortTarget(target.to_string()));
        }
        Ok(Self { target, order })
    }

    pub fn ascending(target: ValueReference) -> FilterResult<Self> {
        Self::new(target, SortOrder::Ascending)
    }

    pub fn descending(target: ValueReference) -> FilterResult<Self> {
        Self::new(target, SortOrder::Descending)
    }

    pub fn target(&self) -> &ValueReference {
        &self.target
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }
}
