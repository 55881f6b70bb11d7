//! The sharded id cache.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{CacheError, CacheResult};

/// Counters observed over a cache's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Shard {
    entries: HashMap<String, i64>,
    /// Insertion order; the front is the oldest entry.
    order: VecDeque<String>,
}

impl Shard {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

/// Maps external ids to surrogate database ids.
///
/// Keys hash to one of `shards` independently locked segments, each holding
/// `capacity / shards` entries. A full shard evicts
/// `floor(per_shard_capacity * drain_factor)` of its oldest entries in one
/// sweep (at least one). Inserts are first-write-wins: a key already present
/// keeps its original id, so a resolved reference can never be silently
/// re-pointed.
pub struct IdCache {
    shards: Vec<Mutex<Shard>>,
    per_shard_capacity: usize,
    drain_count: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl IdCache {
    /// Build a cache holding up to `capacity` entries across `shards`
    /// segments, evicting `drain_factor` of a segment when it fills.
    pub fn new(capacity: usize, shards: usize, drain_factor: f64) -> CacheResult<Self> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        if shards == 0 {
            return Err(CacheError::ZeroConcurrency);
        }
        if !(drain_factor > 0.0 && drain_factor <= 1.0) {
            return Err(CacheError::InvalidDrainFactor(drain_factor));
        }

        let per_shard_capacity = (capacity / shards).max(1);
        let drain_count = ((per_shard_capacity as f64 * drain_factor) as usize).max(1);

        Ok(Self {
            shards: (0..shards).map(|_| Mutex::new(Shard::new())).collect(),
            per_shard_capacity,
            drain_count,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    fn shard_for(&self, key: &str) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Insert a mapping. Returns the id now associated with the key, which
    /// is the existing one if the key was already present.
    pub fn insert(&self, gmlid: &str, id: i64) -> i64 {
        let mut shard = self.shard_for(gmlid).lock();

        if let Some(existing) = shard.entries.get(gmlid) {
            return *existing;
        }

        if shard.entries.len() >= self.per_shard_capacity {
            let mut evicted = 0;
            while evicted < self.drain_count {
                let Some(oldest) = shard.order.pop_front() else {
                    break;
                };
                shard.entries.remove(&oldest);
                evicted += 1;
            }
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }

        shard.entries.insert(gmlid.to_string(), id);
        shard.order.push_back(gmlid.to_string());
        id
    }

    pub fn get(&self, gmlid: &str) -> Option<i64> {
        let shard = self.shard_for(gmlid).lock();
        match shard.entries.get(gmlid) {
            Some(id) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(*id)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Total entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            let mut shard = shard.lock();
            shard.entries.clear();
            shard.order.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn per_shard_capacity(&self) -> usize {
        self.per_shard_capacity
    }
}
