//! Container cache tests

use std::sync::Arc;
use std::thread;

use pivotdb_storage::ContainerCache;

#[test]
fn test_cache_hit_rate() {
    let cache: ContainerCache<Vec<u8>> = ContainerCache::new(256);

    for i in 0..100u64 {
        cache.insert(i, Arc::new(vec![i as u8; 16]));
    }

    for _ in 0..10 {
        for i in 0..100u64 {
            assert!(cache.get(i).is_some(), "Container {} should be cached", i);
        }
    }

    let stats = cache.stats();
    assert_eq!(stats.entries, 100);
    assert!(stats.hit_rate > 0.99, "Hit rate should be ~100%: {}", stats.hit_rate);
}

#[test]
fn test_cache_eviction_under_pressure() {
    let cache: ContainerCache<u64> = ContainerCache::new(8);

    for i in 0..1000u64 {
        cache.insert(i, Arc::new(i));
    }

    let stats = cache.stats();
    assert_eq!(stats.entries, 8);
    assert_eq!(stats.evictions, 992);
    // Most recent entries survive
    assert!(cache.get(999).is_some());
    assert!(cache.get(0).is_none());
}

#[test]
fn test_overwrite_is_not_an_eviction() {
    let cache: ContainerCache<u64> = ContainerCache::new(4);
    cache.insert(1, Arc::new(10));
    cache.insert(1, Arc::new(11));
    assert_eq!(*cache.get(1).unwrap(), 11);
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn test_invalidate_removes_stale_entry() {
    let cache: ContainerCache<u64> = ContainerCache::new(4);
    cache.insert(7, Arc::new(1));

    assert!(cache.invalidate(7));
    assert!(!cache.invalidate(7));
    assert!(cache.get(7).is_none());
    assert_eq!(cache.stats().invalidations, 1);
}

#[test]
fn test_concurrent_access() {
    let cache: Arc<ContainerCache<u64>> = Arc::new(ContainerCache::new(1024));
    let mut handles = vec![];

    for t in 0..4u64 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            for i in 0..200u64 {
                let key = t * 1000 + i;
                cache.insert(key, Arc::new(key));
                assert_eq!(*cache.get(key).unwrap(), key);
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cache.len(), 800);
}
