//! Sharded in-memory id caches.
//!
//! The import pipeline and the XLink resolver map external ids (gml:id) to
//! surrogate database ids far more often than the database should be asked.
//! Caches are sharded by key hash so concurrent workers rarely contend on
//! the same lock, and evict a fixed fraction of their oldest entries when
//! full instead of thrashing one entry at a time.

mod id_cache;
mod manager;

pub use id_cache::{CacheStats, IdCache};
pub use manager::{CacheType, IdCacheManager};

/// Errors raised while configuring caches.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache size must be positive")]
    ZeroCapacity,

    #[error("Drain factor must be in (0, 1], got {0}")]
    InvalidDrainFactor(f64),

    #[error("Concurrency level must be positive")]
    ZeroConcurrency,
}

pub type CacheResult<T> = Result<T, CacheError>;
