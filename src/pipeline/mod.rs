//! Import and export pipelines.
//!
//! Both pipelines share the same shape: a [`worker_pool`] of OS threads
//! behind a bounded queue, caches and the XLink resolver shared by `Arc`,
//! and progress reported through the event dispatcher. The pool's `join()`
//! is the phase boundary between writing features and patching deferred
//! references.

pub mod exporter;
pub mod importer;
pub mod worker_pool;

pub use exporter::{ExportError, ExportResult, Exporter};
pub use importer::{ImportError, ImportOptions, ImportResult, ImportSummary, Importer};
pub use worker_pool::{CancellationToken, PoolError, PoolResult, PoolStats, Worker, WorkerPool};
