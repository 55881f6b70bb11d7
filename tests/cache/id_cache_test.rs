//! Sharded id cache: capacity, eviction arithmetic and sharing.

use std::sync::Arc;

use citystore::cache::{CacheError, CacheType, IdCache, IdCacheManager};

#[test]
fn construction_validates_its_parameters() {
    assert!(matches!(
        IdCache::new(0, 4, 0.5),
        Err(CacheError::ZeroCapacity)
    ));
    assert!(matches!(
        IdCache::new(100, 0, 0.5),
        Err(CacheError::ZeroConcurrency)
    ));
    assert!(matches!(
        IdCache::new(100, 4, 0.0),
        Err(CacheError::InvalidDrainFactor(_))
    ));
    assert!(matches!(
        IdCache::new(100, 4, 1.1),
        Err(CacheError::InvalidDrainFactor(_))
    ));
    assert!(IdCache::new(100, 4, 1.0).is_ok());
}

#[test]
fn capacity_is_split_across_shards() {
    let cache = IdCache::new(100, 4, 0.5).unwrap();
    assert_eq!(cache.shard_count(), 4);
    assert_eq!(cache.per_shard_capacity(), 25);

    // A capacity below the shard count still gives each shard room for one.
    let tiny = IdCache::new(2, 8, 0.5).unwrap();
    assert_eq!(tiny.per_shard_capacity(), 1);
}

#[test]
fn inserts_are_first_write_wins() {
    let cache = IdCache::new(100, 1, 0.5).unwrap();
    assert_eq!(cache.insert("b1", 10), 10);
    assert_eq!(cache.insert("b1", 99), 10);
    assert_eq!(cache.get("b1"), Some(10));
    assert_eq!(cache.len(), 1);
}

#[test]
fn a_full_shard_drains_its_oldest_entries() {
    // Single shard, capacity 10, factor 0.3: floor(10 * 0.3) = 3 evicted.
    let cache = IdCache::new(10, 1, 0.3).unwrap();
    for i in 0..10 {
        cache.insert(&format!("k{i}"), i);
    }
    assert_eq!(cache.len(), 10);

    cache.insert("overflow", 100);
    assert_eq!(cache.stats().evictions, 3);
    assert_eq!(cache.len(), 8);

    for gone in ["k0", "k1", "k2"] {
        assert_eq!(cache.get(gone), None);
    }
    assert_eq!(cache.get("k3"), Some(3));
    assert_eq!(cache.get("overflow"), Some(100));
}

#[test]
fn drain_count_is_at_least_one() {
    // floor(2 * 0.1) = 0 would deadlock a full shard; one entry must go.
    let cache = IdCache::new(2, 1, 0.1).unwrap();
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert("c", 3);

    assert_eq!(cache.stats().evictions, 1);
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(2));
    assert_eq!(cache.get("c"), Some(3));
}

#[test]
fn stats_track_hits_and_misses() {
    let cache = IdCache::new(100, 2, 0.5).unwrap();
    cache.insert("b1", 1);

    cache.get("b1");
    cache.get("b1");
    cache.get("missing");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.evictions, 0);
}

#[test]
fn clear_empties_every_shard() {
    let cache = IdCache::new(100, 4, 0.5).unwrap();
    for i in 0..50 {
        cache.insert(&format!("k{i}"), i);
    }
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.get("k0"), None);
}

#[test]
fn concurrent_writers_never_lose_entries() {
    let cache = Arc::new(IdCache::new(100_000, 8, 0.5).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    cache.insert(&format!("t{t}-k{i}"), i);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.len(), 8000);
}

#[test]
fn manager_shares_caches_by_type() {
    let manager = IdCacheManager::new(1000, 2, 0.5);
    let a = manager.get_cache(CacheType::CityObject).unwrap();
    let b = manager.get_cache(CacheType::CityObject).unwrap();
    a.insert("b1", 7);
    assert_eq!(b.get("b1"), Some(7));

    let geometry = manager.get_cache(CacheType::Geometry).unwrap();
    assert_eq!(geometry.get("b1"), None);
}

#[test]
fn manager_rejects_invalid_configuration_lazily() {
    let manager = IdCacheManager::new(0, 2, 0.5);
    assert!(matches!(
        manager.get_cache(CacheType::CityObject),
        Err(CacheError::ZeroCapacity)
    ));
}

#[test]
fn manager_shutdown_drops_state() {
    let manager = IdCacheManager::new(1000, 2, 0.5);
    manager
        .get_cache(CacheType::CityObject)
        .unwrap()
        .insert("b1", 1);

    manager.shutdown_all();
    let fresh = manager.get_cache(CacheType::CityObject).unwrap();
    assert_eq!(fresh.get("b1"), None);
}
