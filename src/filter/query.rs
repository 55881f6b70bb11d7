//! The query aggregate.

use super::counter::CounterFilter;
use super::predicate::Predicate;
use super::projection::Projection;
use super::sort::SortProperty;

/// Everything an export or count needs: selection, projection, paging and
/// sorting over one root feature type.
///
/// `Clone` yields a deep, independent copy; a cloned template can be reused
/// across concurrent export runs.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "queries have no effect until compiled"]
pub struct Query {
    feature_type: String,
    selection: Option<Predicate>,
    projection: Projection,
    counter: Option<CounterFilter>,
    sorting: Vec<SortProperty>,
    target_srid: Option<i32>,
}

impl Query {
    /// Start a query over a root feature type.
    pub fn new(feature_type: impl Into<String>) -> Self {
        Self {
            feature_type: feature_type.into(),
            selection: None,
            projection: Projection::new(),
            counter: None,
            sorting: Vec::new(),
            target_srid: None,
        }
    }

    /// Set the selection predicate; a second call ANDs with the existing one.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.selection = Some(match self.selection.take() {
            Some(existing) => Predicate::and([existing, predicate]),
            None => predicate,
        });
        self
    }

    pub fn project(mut self, value_ref: crate::schema::ValueReference) -> Self {
        self.projection.add(value_ref);
        self
    }

    pub fn counter(mut self, counter: CounterFilter) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Append a sort key. Keys apply in declared order; ties between equal
    /// keys keep declaration order.
    pub fn sort(mut self, property: SortProperty) -> Self {
        self.sorting.push(property);
        self
    }

    pub fn target_srid(mut self, srid: i32) -> Self {
        self.target_srid = Some(srid);
        self
    }

    pub fn feature_type(&self) -> &str {
        &self.feature_type
    }

    pub fn selection(&self) -> Option<&Predicate> {
        self.selection.as_ref()
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn counter_filter(&self) -> Option<&CounterFilter> {
        self.counter.as_ref()
    }

    pub fn sorting(&self) -> &[SortProperty] {
        &self.sorting
    }

    pub fn srid(&self) -> Option<i32> {
        self.target_srid
    }
}
