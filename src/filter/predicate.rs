//! Predicate tree: the selection half of a [`crate::filter::Query`].
//!
//! One tagged union covers logical, comparison, spatial, resource-id and
//! raw-SQL predicates; the query builder lowers it with a single exhaustive
//! match. Predicates are mutable builders until they reach the builder and
//! can be `reset()` back to their empty state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::geometry::Envelope;
use crate::schema::ValueReference;

use super::{FilterError, FilterResult};

/// Scalar literal on the filter side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    /// ISO-8601 timestamp, kept as text and compared lexicographically.
    /// Tried before `String` so timestamp-shaped text survives a
    /// round-trip; other text falls through to the plain variant.
    #[serde(deserialize_with = "deserialize_timestamp")]
    Timestamp(String),
    String(String),
}

impl Literal {
    /// Build a double literal, rejecting NaN and infinity.
    pub fn double(value: f64) -> FilterResult<Self> {
        if !value.is_finite() {
            return Err(FilterError::NonFiniteLiteral(value));
        }
        Ok(Literal::Double(value))
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    if is_timestamp_text(&text) {
        Ok(text)
    } else {
        Err(serde::de::Error::custom("not an ISO-8601 timestamp"))
    }
}

/// `YYYY-MM-DD`, optionally followed by `T` and a time part.
fn is_timestamp_text(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 10 {
        return false;
    }
    b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
        && (b.len() == 10 || b[10] == b'T')
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

/// Either side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Ref(ValueReference),
    Lit(Literal),
}

impl From<ValueReference> for Operand {
    fn from(v: ValueReference) -> Self {
        Operand::Ref(v)
    }
}

impl From<Literal> for Operand {
    fn from(l: Literal) -> Self {
        Operand::Lit(l)
    }
}

/// Comparison operators and their SQL symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Like,
    Between,
    IsNull,
    IsNotNull,
}

impl ComparisonOperator {
    /// Operators for which swapping operands yields an equal predicate.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, ComparisonOperator::Eq | ComparisonOperator::Ne)
    }

    /// Whether the operator is a NULL test taking no right operand.
    pub fn is_null_test(&self) -> bool {
        matches!(self, ComparisonOperator::IsNull | ComparisonOperator::IsNotNull)
    }
}

/// `left op right`, with `upper` carrying the second bound of BETWEEN.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPredicate {
    pub op: ComparisonOperator,
    pub left: Operand,
    pub right: Option<Operand>,
    pub upper: Option<Operand>,
}

impl ComparisonPredicate {
    /// Clear the right-hand side back to the empty state.
    pub fn reset(&mut self) {
        self.right = None;
        self.upper = None;
    }

    /// Semantic equality: symmetric operators compare operands as an
    /// unordered pair.
    pub fn is_equal_to(&self, other: &ComparisonPredicate) -> bool {
        if self.op != other.op || self.upper != other.upper {
            return false;
        }
        if self.left == other.left && self.right == other.right {
            return true;
        }
        self.op.is_symmetric()
            && other.right.as_ref() == Some(&self.left)
            && self.right.as_ref() == Some(&other.left)
    }
}

/// N-ary AND/OR, unary NOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalPredicate {
    pub op: LogicalOperator,
    /// May start empty and be populated later; lowering an empty AND/OR is a
    /// build error, not a construction error.
    pub operands: Vec<Predicate>,
}

impl LogicalPredicate {
    pub fn reset(&mut self) {
        self.operands.clear();
    }

    /// Semantic equality: operand order is irrelevant for AND/OR.
    pub fn is_equal_to(&self, other: &LogicalPredicate) -> bool {
        if self.op != other.op || self.operands.len() != other.operands.len() {
            return false;
        }
        let mut used = vec![false; other.operands.len()];
        'outer: for a in &self.operands {
            for (i, b) in other.operands.iter().enumerate() {
                if !used[i] && a.is_equal_to(b) {
                    used[i] = true;
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }
}

/// Bounding-box spatial operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOperator {
    BboxIntersects,
    BboxContains,
    BboxWithin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialPredicate {
    pub op: SpatialOperator,
    pub envelope: Envelope,
    /// Overrides the envelope's SRID when set.
    pub srid: Option<i32>,
}

/// Membership test against external ids. An empty set selects nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceIdPredicate {
    pub ids: BTreeSet<String>,
}

impl ResourceIdPredicate {
    pub fn add(&mut self, id: impl Into<String>) -> &mut Self {
        self.ids.insert(id.into());
        self
    }

    pub fn reset(&mut self) {
        self.ids.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Opaque SELECT fragment; only its surrogate-id column leaks outward.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSqlPredicate {
    pub select: String,
}

/// The predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Logical(LogicalPredicate),
    Comparison(ComparisonPredicate),
    Spatial(SpatialPredicate),
    ResourceId(ResourceIdPredicate),
    RawSql(RawSqlPredicate),
}

impl Predicate {
    pub fn and(operands: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Logical(LogicalPredicate {
            op: LogicalOperator::And,
            operands: operands.into_iter().collect(),
        })
    }

    pub fn or(operands: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Logical(LogicalPredicate {
            op: LogicalOperator::Or,
            operands: operands.into_iter().collect(),
        })
    }

    /// Wrap in NOT.
    #[must_use]
    pub fn negate(self) -> Self {
        Predicate::Logical(LogicalPredicate {
            op: LogicalOperator::Not,
            operands: vec![self],
        })
    }

    pub fn compare(
        op: ComparisonOperator,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> Self {
        Predicate::Comparison(ComparisonPredicate {
            op,
            left: left.into(),
            right: Some(right.into()),
            upper: None,
        })
    }

    pub fn equals(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(ComparisonOperator::Eq, left, right)
    }

    pub fn like(target: ValueReference, pattern: impl Into<String>) -> Self {
        Self::compare(
            ComparisonOperator::Like,
            target,
            Literal::String(pattern.into()),
        )
    }

    pub fn between(
        target: ValueReference,
        lower: impl Into<Operand>,
        upper: impl Into<Operand>,
    ) -> Self {
        Predicate::Comparison(ComparisonPredicate {
            op: ComparisonOperator::Between,
            left: Operand::Ref(target),
            right: Some(lower.into()),
            upper: Some(upper.into()),
        })
    }

    pub fn is_null(target: ValueReference) -> Self {
        Predicate::Comparison(ComparisonPredicate {
            op: ComparisonOperator::IsNull,
            left: Operand::Ref(target),
            right: None,
            upper: None,
        })
    }

    pub fn is_not_null(target: ValueReference) -> Self {
        Predicate::Comparison(ComparisonPredicate {
            op: ComparisonOperator::IsNotNull,
            left: Operand::Ref(target),
            right: None,
            upper: None,
        })
    }

    pub fn bbox(op: SpatialOperator, envelope: Envelope) -> Self {
        Predicate::Spatial(SpatialPredicate {
            op,
            envelope,
            srid: None,
        })
    }

    pub fn resource_ids(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Predicate::ResourceId(ResourceIdPredicate {
            ids: ids.into_iter().map(Into::into).collect(),
        })
    }

    pub fn raw_sql(select: impl Into<String>) -> Self {
        Predicate::RawSql(RawSqlPredicate {
            select: select.into(),
        })
    }

    /// Clear the variant back to its empty state.
    pub fn reset(&mut self) {
        match self {
            Predicate::Logical(p) => p.reset(),
            Predicate::Comparison(p) => p.reset(),
            Predicate::ResourceId(p) => p.reset(),
            Predicate::Spatial(p) => p.srid = None,
            Predicate::RawSql(p) => p.select.clear(),
        }
    }

    /// Semantic equality: operand order is irrelevant for symmetric
    /// operators and for AND/OR operand lists. Structural equality remains
    /// available through `PartialEq`.
    pub fn is_equal_to(&self, other: &Predicate) -> bool {
        match (self, other) {
            (Predicate::Logical(a), Predicate::Logical(b)) => a.is_equal_to(b),
            (Predicate::Comparison(a), Predicate::Comparison(b)) => a.is_equal_to(b),
            (Predicate::Spatial(a), Predicate::Spatial(b)) => a == b,
            (Predicate::ResourceId(a), Predicate::ResourceId(b)) => a == b,
            (Predicate::RawSql(a), Predicate::RawSql(b)) => a == b,
            _ => false,
        }
    }
}
