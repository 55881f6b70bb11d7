//! Embedded SQLite adapter.
//!
//! The reference implementation of the database contract: backs tests and
//! small standalone runs without an external server. In-memory databases
//! use SQLite's shared-cache mode so every worker connection sees the same
//! data; an anchor connection held by the adapter keeps the database alive
//! for the adapter's lifetime.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use crate::schema::{JoinKind, SchemaMapping};
use crate::sql::Dialect;

use super::{AdapterError, AdapterResult, DatabaseAdapter, DbConnection, Row, SqlValue};

/// Connection factory over one SQLite database.
pub struct SqliteAdapter {
    uri: String,
    /// Keeps a shared-cache in-memory database alive. None for file-backed
    /// databases.
    _anchor: Option<Mutex<Connection>>,
    /// Surrogate-id sequence, shared by every importer worker.
    next_id: AtomicI64,
}

impl SqliteAdapter {
    /// Open a uniquely named in-memory database shared across connections.
    pub fn in_memory() -> AdapterResult<Self> {
        let uri = format!(
            "file:citystore-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4()
        );
        let anchor = open_uri(&uri)?;
        Ok(Self {
            uri,
            _anchor: Some(Mutex::new(anchor)),
            next_id: AtomicI64::new(1),
        })
    }

    /// Open a file-backed database.
    pub fn open(path: &str) -> AdapterResult<Self> {
        let adapter = Self {
            uri: format!("file:{path}"),
            _anchor: None,
            next_id: AtomicI64::new(1),
        };
        // Fail fast if the file is not writable.
        adapter.connect()?;
        Ok(adapter)
    }

    /// Create one table per feature type in the mapping.
    ///
    /// Relation columns land on whichever table carries the foreign key.
    pub fn create_tables(&self, mapping: &SchemaMapping) -> AdapterResult<()> {
        let mut conn = self.connect()?;
        for ddl in table_ddl(mapping) {
            conn.execute(&ddl)?;
        }
        Ok(())
    }

    /// Seed the surrogate-id sequence above existing data.
    pub fn seed_next_id(&self, next: i64) {
        self.next_id.store(next, Ordering::SeqCst);
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn connect(&self) -> AdapterResult<Box<dyn DbConnection>> {
        Ok(Box::new(SqliteConnection {
            conn: open_uri(&self.uri)?,
        }))
    }

    fn next_surrogate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

fn open_uri(uri: &str) -> Result<Connection, rusqlite::Error> {
    Connection::open_with_flags(
        uri,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI,
    )
}

/// DDL for every table the mapping describes, in name order.
fn table_ddl(mapping: &SchemaMapping) -> Vec<String> {
    use std::collections::BTreeMap;

    // table -> ordered column definitions
    let mut tables: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for ft in mapping.feature_types() {
        let columns = tables.entry(ft.table.clone()).or_default();
        push_column(columns, &format!("\"{}\" INTEGER PRIMARY KEY", ft.id_column));
        push_column(columns, &format!("\"{}\" TEXT", ft.gmlid_column));
        if let Some(envelope) = &ft.envelope_column {
            push_column(columns, &format!("\"{envelope}\" TEXT"));
        }
        for attr in &ft.attributes {
            push_column(columns, &format!("\"{}\"", attr.column));
        }
    }

    // Foreign-key columns go on the table that carries them.
    for ft in mapping.feature_types() {
        for rel in &ft.relations {
            match &rel.join {
                JoinKind::SourceFk { column } => {
                    let columns = tables.entry(ft.table.clone()).or_default();
                    push_column(columns, &format!("\"{column}\" INTEGER"));
                }
                JoinKind::TargetFk { column } => {
                    if let Ok(target) = mapping.feature_type(&rel.target) {
                        let columns = tables.entry(target.table.clone()).or_default();
                        push_column(columns, &format!("\"{column}\" INTEGER"));
                    }
                }
            }
        }
    }

    tables
        .into_iter()
        .map(|(table, columns)| {
            format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" ({})",
                columns.join(", ")
            )
        })
        .collect()
}

fn push_column(columns: &mut Vec<String>, definition: &str) {
    // Shared tables may be visited more than once; the column name is the
    // leading quoted segment of the definition.
    let name = definition.split_whitespace().next().unwrap_or(definition);
    if !columns.iter().any(|c| c.starts_with(name)) {
        columns.push(definition.to_string());
    }
}

struct SqliteConnection {
    conn: Connection,
}

/// Shared-cache connections fail with SQLITE_LOCKED instead of waiting when
/// another connection holds a write lock; the busy handler does not apply.
/// Retry with a short sleep until the writer commits.
fn retry_locked<T>(mut op: impl FnMut() -> Result<T, rusqlite::Error>) -> AdapterResult<T> {
    use rusqlite::ErrorCode;

    let mut attempts = 0;
    loop {
        match op() {
            Err(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    ErrorCode::DatabaseLocked | ErrorCode::DatabaseBusy
                ) && attempts < 1000 =>
            {
                attempts += 1;
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            other => return Ok(other?),
        }
    }
}

impl DbConnection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> AdapterResult<usize> {
        retry_locked(|| self.conn.execute(sql, []))
    }

    fn query(&mut self, sql: &str) -> AdapterResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut columns = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let value = match row.get_ref(i)? {
                    rusqlite::types::ValueRef::Null => SqlValue::Null,
                    rusqlite::types::ValueRef::Integer(v) => SqlValue::Integer(v),
                    rusqlite::types::ValueRef::Real(v) => SqlValue::Real(v),
                    rusqlite::types::ValueRef::Text(v) => {
                        SqlValue::Text(String::from_utf8_lossy(v).into_owned())
                    }
                    rusqlite::types::ValueRef::Blob(_) => {
                        return Err(AdapterError::TypeMismatch {
                            column: name.clone(),
                            expected: "scalar",
                            found: "blob",
                        })
                    }
                };
                columns.push((name.clone(), value));
            }
            out.push(Row::new(columns));
        }
        Ok(out)
    }
}
