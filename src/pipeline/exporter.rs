//! Query-driven export.
//!
//! Exports run a compiled query, materialize the result rows back into
//! features and report progress through the dispatcher. Counting and
//! fetching are split so a host application can show "n of m" progress
//! before the first row arrives.

use std::sync::Arc;

use log::info;

use crate::db::{AdapterError, DatabaseAdapter, Row, SqlValue};
use crate::event::{Event, EventDispatcher, EventPayload, EventType};
use crate::feature::Feature;
use crate::filter::{Literal, Query};
use crate::schema::{MappingError, SchemaMapping};
use crate::sql::builder::{QueryBuildError, QueryBuilder};

/// Errors that abort an export run.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Build(#[from] QueryBuildError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("Count query returned no usable value")]
    BadCount,
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Runs queries against the store and materializes the results.
pub struct Exporter {
    adapter: Arc<dyn DatabaseAdapter>,
    mapping: Arc<SchemaMapping>,
    dispatcher: Arc<EventDispatcher>,
}

impl Exporter {
    pub fn new(
        adapter: Arc<dyn DatabaseAdapter>,
        mapping: Arc<SchemaMapping>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            adapter,
            mapping,
            dispatcher,
        }
    }

    /// Number of root features matching the query's selection. Paging and
    /// sorting do not affect the count.
    pub fn count(&self, query: &Query) -> ExportResult<u64> {
        let stmt = QueryBuilder::new(&self.mapping).build_count(query)?;
        let mut conn = self.adapter.connect()?;
        let rows = conn.query(&stmt.to_sql(self.adapter.dialect()))?;

        let value = rows
            .first()
            .and_then(|row| row.get_at(0))
            .ok_or(ExportError::BadCount)?;
        match value {
            SqlValue::Integer(n) if *n >= 0 => Ok(*n as u64),
            _ => Err(ExportError::BadCount),
        }
    }

    /// Run the query and return the raw result rows.
    pub fn fetch(&self, query: &Query) -> ExportResult<Vec<Row>> {
        let stmt = QueryBuilder::new(&self.mapping).build_select(query)?;
        let mut conn = self.adapter.connect()?;
        Ok(conn.query(&stmt.to_sql(self.adapter.dialect()))?)
    }

    /// Run the query and materialize each row as a flat feature: external
    /// id plus the projected columns as attributes, keyed by their dotted
    /// paths.
    pub fn export(&self, query: &Query) -> ExportResult<Vec<Feature>> {
        let ft = self.mapping.feature_type(query.feature_type())?;
        let rows = self.fetch(query)?;

        let mut features = Vec::with_capacity(rows.len());
        for row in rows {
            let gmlid = row.get_text(&ft.gmlid_column).unwrap_or_default();
            let mut feature = Feature::new(&ft.name, gmlid);
            for index in 2..row.len() {
                // Columns 0 and 1 are the surrogate and external id; the
                // projection follows, aliased by dotted path.
                if let (Some(value), Some(name)) = (row.get_at(index), row.name_at(index)) {
                    if let Some(literal) = to_literal(value) {
                        feature.attributes.insert(name.to_string(), literal);
                    }
                }
            }
            let _ = self.dispatcher.propagate(Event::new(
                EventType::FeatureExported,
                EventPayload::Count(1),
            ));
            features.push(feature);
        }

        info!(
            "exported {} features of type {}",
            features.len(),
            query.feature_type()
        );
        Ok(features)
    }
}

fn to_literal(value: &SqlValue) -> Option<Literal> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(i) => Some(Literal::Integer(*i)),
        SqlValue::Real(f) => Some(Literal::Double(*f)),
        SqlValue::Text(s) => Some(Literal::String(s.clone())),
    }
}
