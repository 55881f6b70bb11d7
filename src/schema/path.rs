//! Schema paths and value references.
//!
//! A [`SchemaPath`] starts at a feature type and walks relations until it
//! reaches an attribute. Every step is validated against the
//! [`SchemaMapping`] as it is appended, so a path that exists is a path the
//! query builder can always lower. A [`ValueReference`] wraps a path whose
//! terminal element is addressable as a scalar.

use std::fmt;

use crate::filter::Literal;

use super::mapping::{MappingError, SchemaMapping};

/// Errors raised during path construction.
#[derive(Debug, thiserror::Error)]
pub enum SchemaPathError {
    #[error("Schema path must not be empty")]
    Empty,

    #[error("Schema path is already terminated by attribute {0}")]
    Closed(String),

    #[error("Step {step} is neither an attribute nor a relation of {feature_type}")]
    UnknownStep { feature_type: String, step: String },

    #[error("A value reference must end in an attribute, not feature type {0}")]
    FeatureTypeTarget(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

pub type SchemaPathResult<T> = Result<T, SchemaPathError>;

/// A predicate narrowing traversal at a single path step.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeCondition {
    /// Attribute of the step's feature type equals a literal.
    Equals { attribute: String, value: Literal },
    And(Vec<NodeCondition>),
    Or(Vec<NodeCondition>),
    Not(Box<NodeCondition>),
}

/// One resolved element of a schema path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathElement {
    FeatureType {
        name: String,
    },
    /// Attribute of the feature type reached so far, resolved to its column.
    Attribute {
        name: String,
        column: String,
        simple: bool,
    },
    /// Relation hop; moves the cursor to the target feature type.
    Relation {
        name: String,
        target: String,
    },
}

impl PathElement {
    pub fn name(&self) -> &str {
        match self {
            PathElement::FeatureType { name } => name,
            PathElement::Attribute { name, .. } => name,
            PathElement::Relation { name, .. } => name,
        }
    }
}

/// One step: a resolved element plus an optional narrowing condition.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    pub element: PathElement,
    pub condition: Option<NodeCondition>,
}

/// An ordered, non-empty walk through the mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaPath {
    steps: Vec<PathStep>,
    /// Feature type the cursor currently points at.
    current_type: String,
}

impl SchemaPath {
    /// Start a path at a feature type.
    pub fn new(mapping: &SchemaMapping, root: &str) -> SchemaPathResult<Self> {
        let ft = mapping.feature_type(root)?;
        Ok(Self {
            steps: vec![PathStep {
                element: PathElement::FeatureType {
                    name: ft.name.clone(),
                },
                condition: None,
            }],
            current_type: ft.name.clone(),
        })
    }

    /// Append the next step by name, resolving it as a relation first and an
    /// attribute second. The built-in names `id` and `gmlid` always resolve
    /// to the surrogate-id and external-id columns of the current type.
    pub fn append(
        &mut self,
        mapping: &SchemaMapping,
        step: &str,
        condition: Option<NodeCondition>,
    ) -> SchemaPathResult<&mut Self> {
        if self.is_closed() {
            return Err(SchemaPathError::Closed(
                self.last().name().to_string(),
            ));
        }

        let ft = mapping.feature_type(&self.current_type)?;
        if let Some(rel) = ft.relation(step) {
            let target = rel.target.clone();
            mapping.feature_type(&target)?;
            self.steps.push(PathStep {
                element: PathElement::Relation {
                    name: rel.name.clone(),
                    target: target.clone(),
                },
                condition,
            });
            self.current_type = target;
            return Ok(self);
        }

        let (name, column, simple) = if let Some(attr) = ft.attribute(step) {
            (attr.name.clone(), attr.column.clone(), attr.simple)
        } else if step == "id" {
            ("id".to_string(), ft.id_column.clone(), true)
        } else if step == "gmlid" {
            ("gmlid".to_string(), ft.gmlid_column.clone(), true)
        } else {
            return Err(SchemaPathError::UnknownStep {
                feature_type: ft.name.clone(),
                step: step.to_string(),
            });
        };

        self.steps.push(PathStep {
            element: PathElement::Attribute {
                name,
                column,
                simple,
            },
            condition,
        });
        Ok(self)
    }

    /// Whether the path is terminated by an attribute.
    pub fn is_closed(&self) -> bool {
        matches!(
            self.steps.last().map(|s| &s.element),
            Some(PathElement::Attribute { .. })
        )
    }

    /// The final path element.
    pub fn last(&self) -> &PathElement {
        // A path is never empty: new() seeds the root element.
        &self.steps.last().expect("schema path is non-empty").element
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Name of the feature type the path starts at.
    pub fn root_feature_type(&self) -> &str {
        match &self.steps[0].element {
            PathElement::FeatureType { name } => name,
            // new() guarantees the first element is a feature type.
            _ => unreachable!("schema path roots at a feature type"),
        }
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", step.element.name())?;
        }
        Ok(())
    }
}

/// A schema path addressable as a scalar value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueReference {
    path: SchemaPath,
}

impl ValueReference {
    /// Wrap a path. Fails if the path is empty or ends at a feature type.
    pub fn new(path: SchemaPath) -> SchemaPathResult<Self> {
        if path.is_empty() {
            return Err(SchemaPathError::Empty);
        }
        match path.last() {
            PathElement::FeatureType { name } => {
                Err(SchemaPathError::FeatureTypeTarget(name.clone()))
            }
            _ => Ok(Self { path }),
        }
    }

    /// Shorthand: build a reference from a root type and dotted step names.
    pub fn parse(mapping: &SchemaMapping, root: &str, steps: &str) -> SchemaPathResult<Self> {
        let mut path = SchemaPath::new(mapping, root)?;
        for step in steps.split('.').filter(|s| !s.is_empty()) {
            path.append(mapping, step, None)?;
        }
        Self::new(path)
    }

    pub fn path(&self) -> &SchemaPath {
        &self.path
    }

    /// Whether the terminal element is a simple attribute.
    pub fn is_simple_attribute(&self) -> bool {
        matches!(self.path.last(), PathElement::Attribute { simple: true, .. })
    }

    /// Whether the terminal attribute is the surrogate-id column of the
    /// feature type the path lands on, after any number of relation hops.
    pub fn is_surrogate_id(&self, mapping: &SchemaMapping) -> bool {
        let mut current = self.path.root_feature_type();
        for step in self.path.iter() {
            match &step.element {
                PathElement::FeatureType { .. } => {}
                PathElement::Relation { target, .. } => current = target,
                PathElement::Attribute { column, .. } => {
                    return mapping
                        .feature_type(current)
                        .map(|ft| ft.id_column == *column)
                        .unwrap_or(false);
                }
            }
        }
        false
    }

    /// Whether the reference addresses the root type's surrogate id without
    /// any relation hop.
    pub fn is_root_id(&self, mapping: &SchemaMapping) -> bool {
        if self.path.len() != 2 {
            return false;
        }
        let Ok(ft) = mapping.feature_type(self.path.root_feature_type()) else {
            return false;
        };
        matches!(
            self.path.last(),
            PathElement::Attribute { column, .. } if *column == ft.id_column
        )
    }
}

impl fmt::Display for ValueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}
