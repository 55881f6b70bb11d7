//! Deferred reference resolution.
//!
//! A reference whose target has not been imported yet (a forward
//! `xlink:href`) cannot be written as a foreign key at import time. Workers
//! register such references here; after the feature pass, `resolve_all()`
//! looks every target up in the id cache (falling back to the database) and
//! patches the waiting rows with UPDATE statements. References still
//! unresolved after the configured number of passes are counted and
//! reported as events, never escalated to an error: one dangling href must
//! not abort a multi-hour import.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::cache::{CacheError, IdCache};
use crate::db::{AdapterError, DatabaseAdapter};
use crate::event::{Event, EventDispatcher, EventPayload, EventType};
use crate::schema::{MappingError, SchemaMapping};
use crate::sql::builder::{QueryBuildError, QueryBuilder};
use crate::sql::dml::Update;
use crate::sql::expr::{col, lit_int, ExprExt, Literal};

/// Errors raised during reference resolution. Unresolvable targets are not
/// errors; these cover infrastructure failures only.
#[derive(Debug, thiserror::Error)]
pub enum XLinkError {
    #[error("XLink entry for table {table} names neither a from nor a to column")]
    MissingColumns { table: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Build(#[from] QueryBuildError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type XLinkResult<T> = Result<T, XLinkError>;

/// Which side of the link carries the foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// The registered row points at the target:
    /// `UPDATE table SET from_column = resolved WHERE id = source_id`.
    Forward,
    /// The target row points back at the registered row:
    /// `UPDATE table SET to_column = source_id WHERE id = resolved`.
    Reverse,
    /// Both columns are patched.
    Bidirectional,
}

/// One deferred reference.
#[derive(Debug, Clone, PartialEq)]
pub struct XLinkEntry {
    /// Table holding the column(s) to patch.
    pub table: String,
    /// Surrogate-id column of that table.
    pub id_column: String,
    /// Surrogate id of the row registered by the worker.
    pub source_id: i64,
    /// Feature type of the referenced target; selects which table is
    /// consulted on a cache miss.
    pub target_type: String,
    /// External id of the referenced target.
    pub target_gmlid: String,
    pub from_column: Option<String>,
    pub to_column: Option<String>,
    /// Gmlid of the referencing feature, carried for reporting.
    pub source_gmlid: String,
}

impl XLinkEntry {
    /// Direction is derived from column presence; an entry with neither
    /// column is invalid.
    pub fn direction(&self) -> XLinkResult<LinkDirection> {
        match (&self.from_column, &self.to_column) {
            (Some(_), Some(_)) => Ok(LinkDirection::Bidirectional),
            (Some(_), None) => Ok(LinkDirection::Forward),
            (None, Some(_)) => Ok(LinkDirection::Reverse),
            (None, None) => Err(XLinkError::MissingColumns {
                table: self.table.clone(),
            }),
        }
    }
}

/// Counters of one resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: u64,
    pub broken: u64,
    pub passes: u32,
}

/// Collects deferred references during import and patches them afterwards.
pub struct XLinkResolver {
    adapter: Arc<dyn DatabaseAdapter>,
    cache: Arc<IdCache>,
    dispatcher: Arc<EventDispatcher>,
    /// Extra passes over unresolved entries after the first.
    retries: u32,
    pending: Mutex<Vec<XLinkEntry>>,
}

impl XLinkResolver {
    pub fn new(
        adapter: Arc<dyn DatabaseAdapter>,
        cache: Arc<IdCache>,
        dispatcher: Arc<EventDispatcher>,
        retries: u32,
    ) -> Self {
        Self {
            adapter,
            cache,
            dispatcher,
            retries,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Register a deferred reference. Invalid entries are rejected at
    /// registration, not discovered at resolution.
    pub fn register(&self, entry: XLinkEntry) -> XLinkResult<()> {
        entry.direction()?;
        self.pending.lock().push(entry);
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Resolve every registered reference.
    ///
    /// Each pass tries the cache first and backfills it from the database
    /// for misses. Entries still unresolved after `1 + retries` passes are
    /// reported as broken via [`EventType::BrokenReference`].
    pub fn resolve_all(&self, mapping: &SchemaMapping) -> XLinkResult<ResolveStats> {
        let mut remaining: Vec<XLinkEntry> = std::mem::take(&mut *self.pending.lock());
        let mut stats = ResolveStats::default();
        if remaining.is_empty() {
            return Ok(stats);
        }

        let builder = QueryBuilder::new(mapping);
        let mut conn = self.adapter.connect()?;
        let dialect = self.adapter.dialect();
        let total_passes = 1 + self.retries;

        for pass in 1..=total_passes {
            stats.passes = pass;
            self.backfill_cache(mapping, &builder, conn.as_mut(), &remaining)?;

            let mut unresolved = Vec::new();
            for entry in remaining {
                match self.cache.get(&entry.target_gmlid) {
                    Some(target_id) => {
                        apply_update(conn.as_mut(), dialect, &entry, target_id)?;
                        stats.resolved += 1;
                    }
                    None => unresolved.push(entry),
                }
            }
            remaining = unresolved;

            debug!(
                "xlink pass {pass}/{total_passes}: {} resolved, {} remaining",
                stats.resolved,
                remaining.len()
            );
            if remaining.is_empty() {
                break;
            }
        }

        for entry in remaining {
            warn!(
                "broken reference: {} -> {} ({})",
                entry.source_gmlid, entry.target_gmlid, entry.target_type
            );
            stats.broken += 1;
            // Delivery failure means the run is already shutting down.
            let _ = self.dispatcher.propagate(Event::new(
                EventType::BrokenReference,
                EventPayload::Reference {
                    gmlid: entry.source_gmlid.clone(),
                    target: entry.target_gmlid.clone(),
                },
            ));
        }

        Ok(stats)
    }

    /// Load cache-missing targets from the database, one batched query per
    /// target feature type.
    fn backfill_cache(
        &self,
        mapping: &SchemaMapping,
        builder: &QueryBuilder<'_>,
        conn: &mut dyn crate::db::DbConnection,
        entries: &[XLinkEntry],
    ) -> XLinkResult<()> {
        use std::collections::BTreeMap;

        let mut missing: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for entry in entries {
            if self.cache.get(&entry.target_gmlid).is_none()
                && mapping.contains(&entry.target_type)
            {
                let batch = missing.entry(entry.target_type.as_str()).or_default();
                if !batch.contains(&entry.target_gmlid) {
                    batch.push(entry.target_gmlid.clone());
                }
            }
        }

        for (target_type, gmlids) in missing {
            let ft = mapping.feature_type(target_type)?;
            let stmt = builder.build_backfill_select(target_type, &gmlids)?;
            for row in conn.query(&stmt.to_sql(self.adapter.dialect()))? {
                let id = row.get_i64(&ft.id_column)?;
                let gmlid = row.get_text(&ft.gmlid_column)?;
                self.cache.insert(gmlid, id);
            }
        }
        Ok(())
    }
}

fn apply_update(
    conn: &mut dyn crate::db::DbConnection,
    dialect: crate::sql::Dialect,
    entry: &XLinkEntry,
    target_id: i64,
) -> XLinkResult<()> {
    // register() already validated the entry.
    let direction = entry.direction()?;

    if matches!(direction, LinkDirection::Forward | LinkDirection::Bidirectional) {
        if let Some(from_column) = &entry.from_column {
            let stmt = Update::table(&entry.table)
                .set(from_column, Literal::Int(target_id))
                .filter(col(&entry.id_column).eq(lit_int(entry.source_id)));
            conn.execute(&stmt.to_sql(dialect))?;
        }
    }
    if matches!(direction, LinkDirection::Reverse | LinkDirection::Bidirectional) {
        if let Some(to_column) = &entry.to_column {
            let stmt = Update::table(&entry.table)
                .set(to_column, Literal::Int(entry.source_id))
                .filter(col(&entry.id_column).eq(lit_int(target_id)));
            conn.execute(&stmt.to_sql(dialect))?;
        }
    }
    Ok(())
}
