//! Object-relational mapping model.
//!
//! A [`SchemaMapping`] is supplied by the host application (deserialized from
//! JSON or built programmatically) and resolves feature-type names to their
//! tables, attribute columns and relations. The schema-path model and the
//! query builder only ever consult the mapping through lookups here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors raised while building or consulting a mapping.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Unknown feature type: {0}")]
    UnknownFeatureType(String),

    #[error("Feature type {feature_type} has no attribute named {attribute}")]
    UnknownAttribute {
        feature_type: String,
        attribute: String,
    },

    #[error("Feature type {feature_type} has no relation named {relation}")]
    UnknownRelation {
        feature_type: String,
        relation: String,
    },

    #[error("Failed to parse mapping: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How a relation hop joins the source table to the target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// The source table carries a column referencing the target's surrogate id.
    SourceFk { column: String },
    /// The target table carries a column referencing the source's surrogate id.
    TargetFk { column: String },
}

/// A named relation from one feature type to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    /// Name of the target feature type.
    pub target: String,
    pub join: JoinKind,
    /// Optional discriminator: only rows of the target table matching this
    /// attribute/value pair belong to the relation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<(String, String)>,
}

/// A scalar or complex attribute of a feature type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub column: String,
    /// Simple attributes map to one scalar column and may be used for
    /// sorting; complex attributes may not.
    #[serde(default = "default_simple")]
    pub simple: bool,
}

fn default_simple() -> bool {
    true
}

/// One feature type and its relational footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureType {
    pub name: String,
    pub table: String,
    /// Surrogate primary key column.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// External identifier column (gml:id).
    #[serde(default = "default_gmlid_column")]
    pub gmlid_column: String,
    /// Envelope/geometry column, if the type carries geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_column: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_gmlid_column() -> String {
    "gmlid".to_string()
}

impl FeatureType {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn has_geometry(&self) -> bool {
        self.envelope_column.is_some()
    }
}

/// The full mapping: every feature type the target schema knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMapping {
    feature_types: BTreeMap<String, FeatureType>,
}

impl SchemaMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a mapping from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, MappingError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Register a feature type. Replaces any previous type of the same name.
    pub fn add_feature_type(&mut self, ft: FeatureType) -> &mut Self {
        self.feature_types.insert(ft.name.clone(), ft);
        self
    }

    pub fn feature_type(&self, name: &str) -> Result<&FeatureType, MappingError> {
        self.feature_types
            .get(name)
            .ok_or_else(|| MappingError::UnknownFeatureType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.feature_types.contains_key(name)
    }

    /// Iterate feature types in name order.
    pub fn feature_types(&self) -> impl Iterator<Item = &FeatureType> {
        self.feature_types.values()
    }

    /// Resolve an attribute of a feature type.
    pub fn attribute(&self, feature_type: &str, name: &str) -> Result<&Attribute, MappingError> {
        self.feature_type(feature_type)?
            .attribute(name)
            .ok_or_else(|| MappingError::UnknownAttribute {
                feature_type: feature_type.to_string(),
                attribute: name.to_string(),
            })
    }

    /// Resolve a relation of a feature type.
    pub fn relation(&self, feature_type: &str, name: &str) -> Result<&Relation, MappingError> {
        self.feature_type(feature_type)?
            .relation(name)
            .ok_or_else(|| MappingError::UnknownRelation {
                feature_type: feature_type.to_string(),
                relation: name.to_string(),
            })
    }
}
