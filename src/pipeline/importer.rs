//! Concurrent feature import.
//!
//! The reader thread pulls top-level features and submits them to a worker
//! pool; each worker owns a database connection and writes one feature
//! subtree per transaction. References whose targets are not yet imported
//! are deferred to the XLink resolver, which patches them after the pool
//! drains.

use std::sync::Arc;

use log::info;

use crate::cache::{CacheError, CacheType, IdCache, IdCacheManager};
use crate::config::Settings;
use crate::db::{AdapterError, DatabaseAdapter, DbConnection};
use crate::event::{Event, EventDispatcher, EventPayload, EventType};
use crate::feature::{Feature, FeatureReader, ReadError};
use crate::schema::{FeatureType, JoinKind, Relation, SchemaMapping};
use crate::sql::dml::{Insert, Update};
use crate::sql::expr::{col, lit_int, ExprExt, Literal};
use crate::sql::Dialect;
use crate::xlink::{XLinkEntry, XLinkError, XLinkResolver};

use super::worker_pool::{CancellationToken, PoolError, Worker, WorkerPool};

/// Errors that abort an import run. Per-feature failures are counted and
/// reported as events instead.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    XLink(#[from] XLinkError),

    #[error("Feature type {0} is not in the schema mapping")]
    UnknownFeatureType(String),

    #[error("Feature type {feature_type} has no relation named {relation}")]
    UnknownRelation {
        feature_type: String,
        relation: String,
    },
}

pub type ImportResult<T> = Result<T, ImportError>;

/// Tuning knobs of one import run.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub pool_size: usize,
    pub queue_size: usize,
    /// Extra XLink resolution passes after the first.
    pub resolver_retries: u32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            pool_size: 2,
            queue_size: 64,
            resolver_retries: 1,
        }
    }
}

impl From<&Settings> for ImportOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            pool_size: settings.import.pool_size,
            queue_size: settings.import.queue_size,
            resolver_retries: settings.resolver.retries,
        }
    }
}

/// Counters of a finished import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Top-level features submitted to the pool.
    pub features: u64,
    /// Top-level features rolled back entirely.
    pub failed: u64,
    /// Deferred references patched by the resolver.
    pub resolved_refs: u64,
    /// References whose target never appeared.
    pub broken_refs: u64,
}

/// Drives one import run.
pub struct Importer {
    adapter: Arc<dyn DatabaseAdapter>,
    mapping: Arc<SchemaMapping>,
    dispatcher: Arc<EventDispatcher>,
    caches: Arc<IdCacheManager>,
    options: ImportOptions,
}

impl Importer {
    pub fn new(
        adapter: Arc<dyn DatabaseAdapter>,
        mapping: Arc<SchemaMapping>,
        dispatcher: Arc<EventDispatcher>,
        caches: Arc<IdCacheManager>,
        options: ImportOptions,
    ) -> Self {
        Self {
            adapter,
            mapping,
            dispatcher,
            caches,
            options,
        }
    }

    /// Import every feature the reader yields.
    ///
    /// Two phases: the worker pool writes feature subtrees, then the
    /// resolver patches deferred references. The pool's `join()` is the
    /// boundary between them.
    pub fn run(
        &self,
        mut reader: impl FeatureReader,
        token: CancellationToken,
    ) -> ImportResult<ImportSummary> {
        let cache = self.caches.get_cache(CacheType::CityObject)?;
        let resolver = Arc::new(XLinkResolver::new(
            Arc::clone(&self.adapter),
            Arc::clone(&cache),
            Arc::clone(&self.dispatcher),
            self.options.resolver_retries,
        ));

        let mut pool: WorkerPool<ImportWorker> = WorkerPool::new(
            "import",
            self.options.pool_size,
            self.options.queue_size,
            || {
                Ok(ImportWorker {
                    conn: self.adapter.connect()?,
                    adapter: Arc::clone(&self.adapter),
                    mapping: Arc::clone(&self.mapping),
                    dispatcher: Arc::clone(&self.dispatcher),
                    cache: Arc::clone(&cache),
                    resolver: Arc::clone(&resolver),
                    dialect: self.adapter.dialect(),
                })
            },
            Arc::clone(&self.dispatcher),
            token.clone(),
        )?;

        let mut summary = ImportSummary::default();
        while let Some(feature) = reader.next_feature()? {
            if token.is_cancelled() {
                break;
            }
            summary.features += 1;
            pool.submit(feature)?;
        }

        let stats = pool.join();
        summary.failed = stats.failed;

        let resolve = resolver.resolve_all(&self.mapping)?;
        summary.resolved_refs = resolve.resolved;
        summary.broken_refs = resolve.broken;

        info!(
            "import finished: {} features ({} failed), {} refs resolved, {} broken",
            summary.features, summary.failed, summary.resolved_refs, summary.broken_refs
        );
        Ok(summary)
    }
}

/// A foreign-key column a parent imposes on a child row (the child side of
/// a target-side join).
struct ImposedColumn {
    column: String,
    value: i64,
}

/// Writes one feature subtree per item, inside one transaction.
struct ImportWorker {
    conn: Box<dyn DbConnection>,
    adapter: Arc<dyn DatabaseAdapter>,
    mapping: Arc<SchemaMapping>,
    dispatcher: Arc<EventDispatcher>,
    cache: Arc<IdCache>,
    resolver: Arc<XLinkResolver>,
    dialect: Dialect,
}

impl Worker for ImportWorker {
    type Item = Feature;
    type Error = ImportError;

    fn process(&mut self, feature: Feature, _token: &CancellationToken) -> ImportResult<()> {
        self.conn.begin()?;
        match self.insert_subtree(&feature, None) {
            Ok(_) => {
                self.conn.commit()?;
                let _ = self.dispatcher.propagate(Event::new(
                    EventType::FeatureImported,
                    EventPayload::Count(feature.subtree_size() as u64),
                ));
                Ok(())
            }
            Err(e) => {
                self.conn.rollback()?;
                Err(e)
            }
        }
    }
}

impl ImportWorker {
    /// Insert a feature and its subtree; returns the feature's surrogate id.
    ///
    /// Children behind a source-side foreign key are written before the
    /// parent so the parent's row carries their ids; children behind a
    /// target-side key are written after, with the parent's id imposed on
    /// their rows.
    fn insert_subtree(
        &mut self,
        feature: &Feature,
        imposed: Option<ImposedColumn>,
    ) -> ImportResult<i64> {
        let ft = self
            .mapping
            .feature_type(&feature.feature_type)
            .map_err(|_| ImportError::UnknownFeatureType(feature.feature_type.clone()))?
            .clone();

        let id = self.adapter.next_surrogate_id();

        let mut stmt = Insert::into(&ft.table)
            .column(&ft.id_column, Literal::Int(id))
            .column(&ft.gmlid_column, Literal::String(feature.gmlid.clone()));

        if let Some(imp) = &imposed {
            stmt = stmt.column(&imp.column, Literal::Int(imp.value));
        }

        if let (Some(column), Some(envelope)) = (&ft.envelope_column, &feature.envelope) {
            stmt = stmt.column(column, Literal::String(envelope.to_wkt()));
        }

        for (name, value) in &feature.attributes {
            if let Some(attr) = ft.attribute(name) {
                stmt = stmt.column(&attr.column, value.into());
            }
        }

        let mut deferred_children = Vec::new();
        for child in &feature.children {
            let rel = ft
                .relation(&child.relation)
                .ok_or_else(|| ImportError::UnknownRelation {
                    feature_type: ft.name.clone(),
                    relation: child.relation.clone(),
                })?
                .clone();
            match rel.join {
                JoinKind::SourceFk { column } => {
                    let child_id = self.insert_subtree(&child.feature, None)?;
                    stmt = stmt.column(&column, Literal::Int(child_id));
                }
                JoinKind::TargetFk { column } => {
                    deferred_children.push((column, &child.feature));
                }
            }
        }

        for reference in &feature.references {
            let rel = ft
                .relation(&reference.relation)
                .ok_or_else(|| ImportError::UnknownRelation {
                    feature_type: ft.name.clone(),
                    relation: reference.relation.clone(),
                })?
                .clone();
            stmt = self.link_reference(&ft, id, &feature.gmlid, &rel, &reference.target_gmlid, stmt)?;
        }

        self.conn.execute(&stmt.to_sql(self.dialect))?;
        self.cache.insert(&feature.gmlid, id);

        for (column, child) in deferred_children {
            self.insert_subtree(
                child,
                Some(ImposedColumn {
                    column,
                    value: id,
                }),
            )?;
        }

        Ok(id)
    }

    /// Wire one reference: resolved targets are linked immediately, unknown
    /// targets are deferred to the resolver.
    fn link_reference(
        &mut self,
        ft: &FeatureType,
        source_id: i64,
        source_gmlid: &str,
        rel: &Relation,
        target_gmlid: &str,
        stmt: Insert,
    ) -> ImportResult<Insert> {
        match &rel.join {
            JoinKind::SourceFk { column } => {
                if let Some(target_id) = self.cache.get(target_gmlid) {
                    return Ok(stmt.column(column, Literal::Int(target_id)));
                }
                self.resolver.register(XLinkEntry {
                    table: ft.table.clone(),
                    id_column: ft.id_column.clone(),
                    source_id,
                    target_type: rel.target.clone(),
                    target_gmlid: target_gmlid.to_string(),
                    from_column: Some(column.clone()),
                    to_column: None,
                    source_gmlid: source_gmlid.to_string(),
                })?;
            }
            JoinKind::TargetFk { column } => {
                let target_ft = self
                    .mapping
                    .feature_type(&rel.target)
                    .map_err(|_| ImportError::UnknownFeatureType(rel.target.clone()))?
                    .clone();
                if let Some(target_id) = self.cache.get(target_gmlid) {
                    let update = Update::table(&target_ft.table)
                        .set(column, Literal::Int(source_id))
                        .filter(col(&target_ft.id_column).eq(lit_int(target_id)));
                    self.conn.execute(&update.to_sql(self.dialect))?;
                } else {
                    self.resolver.register(XLinkEntry {
                        table: target_ft.table.clone(),
                        id_column: target_ft.id_column.clone(),
                        source_id,
                        target_type: rel.target.clone(),
                        target_gmlid: target_gmlid.to_string(),
                        from_column: None,
                        to_column: Some(column.clone()),
                        source_gmlid: source_gmlid.to_string(),
                    })?;
                }
            }
        }
        Ok(stmt)
    }
}
