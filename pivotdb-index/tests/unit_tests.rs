//! End-to-end scenarios on a small hand-checked dataset

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use pivotdb_core::{
    BucketStore, Error, IndexConfig, IndexState, InsertOutcome, ObjectId, OrderedStore,
    QueryStats, Result, SortKey, StrategyConfig,
};
use pivotdb_index::{
    Components, EditDistance, FixedPivotSelector, KMeansClusterer, MetricIndex, StringCodec,
};
use pivotdb_storage::{MemoryBucketStore, SkipListStore};

const WORDS: [&str; 5] = ["a", "ab", "abc", "abcd", "b"];

fn strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::Pyramid,
        StrategyConfig::space_tree(1),
        StrategyConfig::BucketSplit,
    ]
}

fn fixture_config(strategy: StrategyConfig) -> IndexConfig {
    IndexConfig {
        pivot_count: 2,
        min_distance: 0.0,
        max_distance: 10.0,
        strategy,
        ..Default::default()
    }
}

fn load_fixture(index: &MetricIndex<String>) {
    for (i, w) in WORDS.iter().enumerate() {
        assert_eq!(index.insert(w.to_string()).unwrap(), InsertOutcome::Inserted(i as u64));
    }
    index.freeze().unwrap();
}

fn frozen_index(strategy: StrategyConfig) -> MetricIndex<String> {
    let index = MetricIndex::new(
        fixture_config(strategy),
        Arc::new(EditDistance),
        Arc::new(StringCodec),
        Arc::new(FixedPivotSelector::new(vec![0, 3])),
    )
    .unwrap();
    load_fixture(&index);
    index
}

#[test]
fn test_self_queries_find_themselves() {
    for strategy in strategies() {
        let index = frozen_index(strategy.clone());
        for (i, w) in WORDS.iter().enumerate() {
            let hits = index.search_range(&w.to_string(), 0.0, 1).unwrap();
            assert_eq!(hits.len(), 1, "{} / {}", strategy.name(), w);
            assert_eq!(hits[0].id, i as u64);
            assert_eq!(hits[0].object, *w);
            assert_eq!(hits[0].distance, 0.0);
        }
    }
}

#[test]
fn test_full_radius_matches_hand_computed_table() {
    // Edit distances from "abc": a 2, ab 1, abc 0, abcd 1, b 2
    let expected: Vec<(u64, f64)> = vec![(2, 0.0), (1, 1.0), (3, 1.0), (0, 2.0), (4, 2.0)];

    for strategy in strategies() {
        let index = frozen_index(strategy.clone());
        let hits = index.search_range(&"abc".to_string(), 10.0, 5).unwrap();
        let got: Vec<(u64, f64)> = hits.iter().map(|h| (h.id, h.distance)).collect();
        assert_eq!(got, expected, "strategy {}", strategy.name());
    }
}

#[test]
fn test_k_limits_results() {
    for strategy in strategies() {
        let index = frozen_index(strategy);
        // Cut between the distance-1 and distance-2 groups so ties cannot
        // depend on visiting order
        let hits = index.search_range(&"abc".to_string(), 10.0, 3).unwrap();
        let got: Vec<(u64, f64)> = hits.iter().map(|h| (h.id, h.distance)).collect();
        assert_eq!(got, vec![(2, 0.0), (1, 1.0), (3, 1.0)]);
    }
}

#[test]
fn test_radius_limits_results() {
    for strategy in strategies() {
        let index = frozen_index(strategy);
        let hits = index.search_range(&"ab".to_string(), 1.0, 10).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        // ab itself at 0; a, abc and b at 1
        assert_eq!(ids, vec![1, 0, 2, 4]);
    }
}

#[test]
fn test_query_outside_dataset() {
    for strategy in strategies() {
        let index = frozen_index(strategy);
        let hits = index.search_range(&"xyz".to_string(), 1.0, 5).unwrap();
        assert!(hits.is_empty());
        let hits = index.search_range(&"abd".to_string(), 1.0, 5).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}

#[test]
fn test_stats_are_accumulated_per_call() {
    let index = frozen_index(StrategyConfig::Pyramid);
    let mut stats = QueryStats::new();
    index
        .search_range_with_stats(&"abc".to_string(), 10.0, 5, &mut stats)
        .unwrap();
    // Two pivot distances plus one per verified candidate
    assert_eq!(stats.distance_computations, 2 + 5);
    assert!(stats.ranges_scanned >= 1);

    let first = stats.clone();
    index
        .search_range_with_stats(&"abc".to_string(), 10.0, 5, &mut stats)
        .unwrap();
    assert_eq!(stats.distance_computations, 2 * first.distance_computations);

    stats.reset();
    assert_eq!(stats, QueryStats::default());
    assert_eq!(index.metrics().queries_executed, 2);
}

#[test]
fn test_pivots_and_lookup() {
    let index = frozen_index(StrategyConfig::Pyramid);
    assert_eq!(index.pivots().unwrap(), vec!["a".to_string(), "abcd".to_string()]);
    assert_eq!(index.get_object_by_id(4).unwrap(), "b");
    assert!(matches!(index.get_object_by_id(99), Err(Error::ObjectNotFound { id: 99 })));
    assert!(index.exists(&"abcd".to_string()));
    assert_eq!(index.len().unwrap(), 5);
}

#[test]
fn test_get_box_per_strategy() {
    let pyramid = frozen_index(StrategyConfig::Pyramid);
    for w in WORDS {
        assert!(pyramid.get_box(&w.to_string()).unwrap() < pyramid.total_boxes());
    }

    let tree = frozen_index(StrategyConfig::space_tree(1));
    let boxes: Vec<u64> = WORDS
        .iter()
        .map(|w| tree.get_box(&w.to_string()).unwrap())
        .collect();
    assert!(boxes.iter().all(|b| *b < 2));
    // Both leaves are populated
    assert!(boxes.contains(&0) && boxes.contains(&1));

    let buckets = frozen_index(StrategyConfig::BucketSplit);
    assert_eq!(buckets.get_box(&"a".to_string()).unwrap(), 0b10);
    assert_eq!(buckets.get_box(&"abc".to_string()).unwrap(), 0b01);
}

#[test]
fn test_insert_after_freeze_is_searchable() {
    for strategy in strategies() {
        let index = frozen_index(strategy);
        assert_eq!(index.insert("abce".to_string()).unwrap(), InsertOutcome::Inserted(5));
        let hits = index.search_range(&"abce".to_string(), 0.0, 1).unwrap();
        assert_eq!(hits[0].id, 5);

        // Too far from pivot "a" for the declared bounds
        let outcome = index.insert("zzzzzzzzzzzz".to_string()).unwrap();
        assert_eq!(outcome, InsertOutcome::Excluded(6));
        assert!(index.search_range(&"zzzzzzzzzzzz".to_string(), 10.0, 10).unwrap().is_empty());
        assert_eq!(index.get_object_by_id(6).unwrap(), "zzzzzzzzzzzz");
        assert_eq!(index.metrics().records_excluded, 1);
    }
}

#[test]
fn test_delete_after_freeze() {
    for strategy in strategies() {
        let index = frozen_index(strategy);
        assert!(index.delete(2).unwrap());
        assert!(!index.delete(2).unwrap());
        assert!(!index.exists(&"abc".to_string()));

        let hits = index.search_range(&"abc".to_string(), 10.0, 5).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 3, 0, 4]);

        // Content can be inserted again under a fresh id
        assert_eq!(index.insert("abc".to_string()).unwrap(), InsertOutcome::Inserted(5));
        assert_eq!(index.metrics().objects_deleted, 1);
    }
}

#[test]
fn test_config_from_json() {
    let json = r#"{
        "pivot_count": 2,
        "max_distance": 10.0,
        "strategy": {
            "kind": "space_tree",
            "depth": 1,
            "cluster_retries": 4,
            "cluster_iterations": 10
        }
    }"#;
    let config = IndexConfig::from_json(json).unwrap();
    let index = MetricIndex::new(
        config,
        Arc::new(EditDistance),
        Arc::new(StringCodec),
        Arc::new(FixedPivotSelector::new(vec![0, 3])),
    )
    .unwrap();
    assert_eq!(index.state(), IndexState::Unfrozen);
    assert_eq!(index.total_boxes(), 2);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = IndexConfig {
        pivot_count: 0,
        ..Default::default()
    };
    let result = MetricIndex::new(
        config,
        Arc::new(EditDistance),
        Arc::new(StringCodec),
        Arc::new(FixedPivotSelector::new(vec![])),
    );
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn test_space_tree_depth_zero_uses_pyramid_boxes() {
    let unfrozen = MetricIndex::new(
        fixture_config(StrategyConfig::space_tree(0)),
        Arc::new(EditDistance),
        Arc::new(StringCodec),
        Arc::new(FixedPivotSelector::new(vec![0, 3])),
    )
    .unwrap();
    assert_eq!(unfrozen.total_boxes(), 4);

    let tree = frozen_index(StrategyConfig::space_tree(0));
    let pyramid = frozen_index(StrategyConfig::Pyramid);
    assert_eq!(tree.total_boxes(), 4);
    for w in WORDS {
        let w = w.to_string();
        assert_eq!(tree.get_box(&w).unwrap(), pyramid.get_box(&w).unwrap());
    }
}

// ============================================================================
// Store failures after freeze
// ============================================================================

/// Ordered store whose writes fail while `down` is set
struct FlakyOrderedStore {
    inner: SkipListStore,
    down: AtomicBool,
}

impl FlakyOrderedStore {
    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Storage {
                message: "key store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl OrderedStore for FlakyOrderedStore {
    fn put(&self, key: SortKey, value: Bytes) -> Result<()> {
        self.check()?;
        self.inner.put(key, value)
    }

    fn range_scan(&self, low: SortKey, high: SortKey) -> Result<Vec<(SortKey, Bytes)>> {
        self.inner.range_scan(low, high)
    }

    fn get(&self, id: ObjectId) -> Result<Option<Bytes>> {
        self.inner.get(id)
    }

    fn delete(&self, id: ObjectId) -> Result<bool> {
        self.inner.delete(id)
    }

    fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    fn scan_all(&self) -> Result<Vec<(SortKey, Bytes)>> {
        self.inner.scan_all()
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

/// Bucket store whose writes fail while `down` is set
struct FlakyBucketStore {
    inner: MemoryBucketStore,
    down: AtomicBool,
}

impl BucketStore for FlakyBucketStore {
    fn put(&self, bucket_id: u64, value: Bytes) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Storage {
                message: "bucket store unavailable".to_string(),
            });
        }
        self.inner.put(bucket_id, value)
    }

    fn get(&self, bucket_id: u64) -> Result<Option<Bytes>> {
        self.inner.get(bucket_id)
    }

    fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

fn index_over(strategy: StrategyConfig, components: Components) -> MetricIndex<String> {
    MetricIndex::with_components(
        fixture_config(strategy),
        Arc::new(EditDistance),
        Arc::new(StringCodec),
        Arc::new(FixedPivotSelector::new(vec![0, 3])),
        components,
    )
    .unwrap()
}

/// A failed index write leaves no trace, and the same content can be inserted again
fn assert_failed_insert_rolls_back(index: &MetricIndex<String>, set_down: impl Fn(bool)) {
    let word = "abce".to_string();
    set_down(true);
    let err = index.insert(word.clone()).unwrap_err();
    assert!(matches!(err, Error::Storage { .. }));
    assert!(err.is_recoverable());
    assert!(!index.exists(&word));
    assert_eq!(index.len().unwrap(), WORDS.len());
    assert!(matches!(
        index.get_object_by_id(5),
        Err(Error::ObjectNotFound { id: 5 })
    ));

    set_down(false);
    let outcome = index.insert(word.clone()).unwrap();
    assert!(matches!(outcome, InsertOutcome::Inserted(_)));
    let hits = index.search_range(&word, 0.0, 1).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, outcome.id());
    assert_eq!(index.len().unwrap(), WORDS.len() + 1);
}

#[test]
fn test_failed_pyramid_write_rolls_back_insert() {
    for strategy in [StrategyConfig::Pyramid, StrategyConfig::space_tree(1)] {
        let keys = Arc::new(FlakyOrderedStore {
            inner: SkipListStore::new("pyramid_keys"),
            down: AtomicBool::new(false),
        });
        let components = Components {
            object_store: Arc::new(SkipListStore::new("objects")),
            key_store: Arc::clone(&keys) as Arc<dyn OrderedStore>,
            bucket_store: Arc::new(MemoryBucketStore::new()),
            clusterer: Arc::new(KMeansClusterer::default()),
        };
        let index = index_over(strategy, components);
        load_fixture(&index);
        assert_failed_insert_rolls_back(&index, |down| keys.down.store(down, Ordering::SeqCst));
    }
}

#[test]
fn test_failed_bucket_write_rolls_back_insert() {
    let buckets = Arc::new(FlakyBucketStore {
        inner: MemoryBucketStore::new(),
        down: AtomicBool::new(false),
    });
    let components = Components {
        object_store: Arc::new(SkipListStore::new("objects")),
        key_store: Arc::new(SkipListStore::new("pyramid_keys")),
        bucket_store: Arc::clone(&buckets) as Arc<dyn BucketStore>,
        clusterer: Arc::new(KMeansClusterer::default()),
    };
    let index = index_over(StrategyConfig::BucketSplit, components);
    load_fixture(&index);
    assert_failed_insert_rolls_back(&index, |down| buckets.down.store(down, Ordering::SeqCst));
}
