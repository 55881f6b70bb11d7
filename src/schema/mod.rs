//! Schema mapping and schema-path model.
//!
//! The mapping describes how feature types land in relational tables; a
//! [`SchemaPath`] is a validated walk through that mapping from a root
//! feature type down to an attribute or relation. Everything the query
//! builder joins or projects is addressed through these paths.

pub mod mapping;
pub mod path;

pub use mapping::{
    Attribute, FeatureType, JoinKind, MappingError, Relation, SchemaMapping,
};
pub use path::{
    NodeCondition, PathElement, SchemaPath, SchemaPathError, SchemaPathResult, ValueReference,
};
