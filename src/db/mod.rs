//! The database contract.
//!
//! Adapters hand out connections; connections execute finished SQL strings
//! and return plain rows. Everything above this module works in terms of
//! [`DatabaseAdapter`] and [`DbConnection`], so the pipeline is identical
//! over PostGIS, Oracle Spatial or the embedded engine.

pub mod sqlite;

pub use sqlite::SqliteAdapter;

use crate::sql::Dialect;

/// Errors raised by adapters and connections.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Query returned no rows")]
    NoRows,

    #[error("Row has no column named {0}")]
    UnknownColumn(String),

    #[error("Column {column} holds a {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// A scalar value read from or written to the database.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
        }
    }
}

/// One result row: column names paired with values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> AdapterResult<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| AdapterError::UnknownColumn(name.to_string()))
    }

    pub fn get_i64(&self, name: &str) -> AdapterResult<i64> {
        match self.get(name)? {
            SqlValue::Integer(i) => Ok(*i),
            other => Err(AdapterError::TypeMismatch {
                column: name.to_string(),
                expected: "integer",
                found: other.type_name(),
            }),
        }
    }

    pub fn get_text(&self, name: &str) -> AdapterResult<&str> {
        match self.get(name)? {
            SqlValue::Text(s) => Ok(s),
            other => Err(AdapterError::TypeMismatch {
                column: name.to_string(),
                expected: "text",
                found: other.type_name(),
            }),
        }
    }

    /// Value by position in the select list.
    pub fn get_at(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, v)| v)
    }

    /// Column name by position in the select list.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A live connection executing finished SQL.
pub trait DbConnection: Send {
    /// Execute a statement; returns the number of affected rows.
    fn execute(&mut self, sql: &str) -> AdapterResult<usize>;

    /// Run a query and collect all result rows.
    fn query(&mut self, sql: &str) -> AdapterResult<Vec<Row>>;

    fn begin(&mut self) -> AdapterResult<()> {
        self.execute("BEGIN").map(|_| ())
    }

    fn commit(&mut self) -> AdapterResult<()> {
        self.execute("COMMIT").map(|_| ())
    }

    fn rollback(&mut self) -> AdapterResult<()> {
        self.execute("ROLLBACK").map(|_| ())
    }
}

/// A connection factory bound to one database.
///
/// Adapters are shared across worker threads; each worker opens its own
/// connection.
pub trait DatabaseAdapter: Send + Sync {
    /// Dialect the adapter's SQL must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Open a new connection.
    fn connect(&self) -> AdapterResult<Box<dyn DbConnection>>;

    /// Next value of the global surrogate-id sequence.
    fn next_surrogate_id(&self) -> i64;
}
