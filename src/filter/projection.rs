//! Projection: the set of value references a query selects.

use crate::schema::ValueReference;

/// Ordered, duplicate-free set of projected value references.
///
/// Insertion order is preserved so the SELECT list is deterministic;
/// duplicates (same dotted path) are dropped on insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    refs: Vec<ValueReference>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference; a reference with an identical path is ignored.
    pub fn add(&mut self, value_ref: ValueReference) -> &mut Self {
        if !self.refs.iter().any(|r| r.path() == value_ref.path()) {
            self.refs.push(value_ref);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValueReference> {
        self.refs.iter()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

impl FromIterator<ValueReference> for Projection {
    fn from_iter<T: IntoIterator<Item = ValueReference>>(iter: T) -> Self {
        let mut p = Projection::new();
        for r in iter {
            p.add(r);
        }
        p
    }
}
