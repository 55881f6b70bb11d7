//! Cache registry.

use std::sync::Arc;

use dashmap::DashMap;
use log::debug;

use super::{CacheResult, IdCache};

/// The kinds of id cache an import run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheType {
    /// External ids of city objects.
    CityObject,
    /// External ids of shared geometries.
    Geometry,
}

impl CacheType {
    fn name(&self) -> &'static str {
        match self {
            CacheType::CityObject => "city_object",
            CacheType::Geometry => "geometry",
        }
    }
}

/// Owns the id caches of one import run.
///
/// Caches are created lazily with one shard per configured concurrency
/// level and shared by `Arc`; `get_cache` on an uninitialized type
/// initializes it.
pub struct IdCacheManager {
    caches: DashMap<CacheType, Arc<IdCache>>,
    cache_size: usize,
    concurrency_level: usize,
    drain_factor: f64,
}

impl From<&crate::config::CacheSettings> for IdCacheManager {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self::new(
            settings.cache_size,
            settings.concurrency_level,
            settings.drain_factor,
        )
    }
}

impl IdCacheManager {
    pub fn new(cache_size: usize, concurrency_level: usize, drain_factor: f64) -> Self {
        Self {
            caches: DashMap::new(),
            cache_size,
            concurrency_level,
            drain_factor,
        }
    }

    /// Get the cache of a type, creating it on first use.
    pub fn get_cache(&self, cache_type: CacheType) -> CacheResult<Arc<IdCache>> {
        if let Some(cache) = self.caches.get(&cache_type) {
            return Ok(Arc::clone(&cache));
        }

        let cache = Arc::new(IdCache::new(
            self.cache_size,
            self.concurrency_level,
            self.drain_factor,
        )?);
        debug!(
            "initialized {} cache: {} shards x {} entries",
            cache_type.name(),
            cache.shard_count(),
            cache.per_shard_capacity()
        );

        // Another thread may have won the race; keep its cache.
        Ok(Arc::clone(
            &self
                .caches
                .entry(cache_type)
                .or_insert(cache),
        ))
    }

    /// Drop all caches, logging their final counters.
    pub fn shutdown_all(&self) {
        self.caches.retain(|cache_type, cache| {
            let stats = cache.stats();
            debug!(
                "{} cache: {} hits, {} misses, {} evictions",
                cache_type.name(),
                stats.hits,
                stats.misses,
                stats.evictions
            );
            false
        });
    }
}
