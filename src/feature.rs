//! The in-memory feature model.
//!
//! A [`Feature`] is one city object as the import pipeline sees it: typed
//! attributes, an optional envelope, nested child features and unresolved
//! references to features elsewhere in the dataset. The model is
//! deliberately storage-agnostic; the mapping decides where everything
//! lands.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::Literal;
use crate::geometry::Envelope;

/// Errors raised by feature sources.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Failed to parse feature input: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type ReadResult<T> = Result<T, ReadError>;

/// A nested child feature reached through a named relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildFeature {
    pub relation: String,
    pub feature: Feature,
}

/// An unresolved reference: a relation pointing at another feature's
/// external id (an `xlink:href` in the source document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRef {
    pub relation: String,
    pub target_gmlid: String,
}

/// One city object and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub feature_type: String,
    pub gmlid: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Envelope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildFeature>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<FeatureRef>,
}

impl Feature {
    pub fn new(feature_type: impl Into<String>, gmlid: impl Into<String>) -> Self {
        Self {
            feature_type: feature_type.into(),
            gmlid: gmlid.into(),
            attributes: BTreeMap::new(),
            envelope: None,
            children: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_child(mut self, relation: impl Into<String>, feature: Feature) -> Self {
        self.children.push(ChildFeature {
            relation: relation.into(),
            feature,
        });
        self
    }

    pub fn with_reference(
        mut self,
        relation: impl Into<String>,
        target_gmlid: impl Into<String>,
    ) -> Self {
        self.references.push(FeatureRef {
            relation: relation.into(),
            target_gmlid: target_gmlid.into(),
        });
        self
    }

    pub fn has_geometry(&self) -> bool {
        self.envelope.is_some()
    }

    /// Number of features in this subtree, self included.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|c| c.feature.subtree_size())
            .sum::<usize>()
    }

    /// Visit this feature and all descendants depth-first, parents before
    /// children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Feature)) {
        visit(self);
        for child in &self.children {
            child.feature.walk(visit);
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.feature_type, self.gmlid)
    }
}

/// A streaming source of top-level features.
///
/// Implementations pull from a parsed document, a test fixture or another
/// store; the import pipeline only ever calls `next_feature()`.
pub trait FeatureReader: Send {
    fn next_feature(&mut self) -> ReadResult<Option<Feature>>;
}

/// Reader over a pre-built list of features. The fixture reader for tests
/// and small programmatic imports.
#[derive(Debug, Default)]
pub struct VecReader {
    features: std::vec::IntoIter<Feature>,
}

impl VecReader {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features: features.into_iter(),
        }
    }
}

impl FeatureReader for VecReader {
    fn next_feature(&mut self) -> ReadResult<Option<Feature>> {
        Ok(self.features.next())
    }
}
