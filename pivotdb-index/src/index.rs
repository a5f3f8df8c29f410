//! # Metric Index
//!
//! Lifecycle controller tying the transform and a partitioning strategy to
//! the backing stores.
//!
//! ## Lifecycle
//!
//! ```text
//! Unfrozen ──freeze()──► Freezing ──ok──► Frozen
//!    ▲                      │
//!    └──────── error ───────┘   (strategy stores cleared)
//! ```
//!
//! Objects inserted while unfrozen are only staged in the object table.
//! `freeze()` selects pivots, computes every staged tuple in parallel,
//! estimates medians and trains the configured strategy. After that, inserts
//! and deletes go through the trained transform without retraining.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use pivotdb_core::metrics::Timer;
use pivotdb_core::{
    BucketStore, Clusterer, ContentDigest, Error, IndexConfig, IndexState, InsertOutcome, Metric,
    Metrics, MetricsSnapshot, ObjectCodec, ObjectId, OrderedStore, PivotSelector, PivotTuple,
    QueryStats, Result, SearchHit, SortKey, StrategyConfig,
};
use pivotdb_storage::{MemoryBucketStore, SkipListStore};

use crate::aggregator::BoundedResultSet;
use crate::bucket::BucketPartitioning;
use crate::cluster::KMeansClusterer;
use crate::median::median_vector;
use crate::partitioning::{PyramidMode, PyramidPartitioning};
use crate::traits::{CandidateSink, Partitioning, TrainingSet};
use crate::transform::{chebyshev, PivotTransform};

/// Relative tolerance added to every search radius, as a fraction of the
/// declared distance range. Covers rounding in the tuple and key arithmetic.
pub const FLOAT_SLACK: f64 = 1e-9;

/// Backing stores and training collaborators
pub struct Components {
    /// Raw-object table
    pub object_store: Arc<dyn OrderedStore>,
    /// Pyramid-key table
    pub key_store: Arc<dyn OrderedStore>,
    pub bucket_store: Arc<dyn BucketStore>,
    pub clusterer: Arc<dyn Clusterer>,
}

impl Components {
    /// In-memory reference stores
    pub fn in_memory(config: &IndexConfig) -> Self {
        let iterations = match config.strategy {
            StrategyConfig::SpaceTree { cluster_iterations, .. } => cluster_iterations,
            _ => 20,
        };
        Self {
            object_store: Arc::new(SkipListStore::new("objects")),
            key_store: Arc::new(SkipListStore::new("pyramid_keys")),
            bucket_store: Arc::new(MemoryBucketStore::new()),
            clusterer: Arc::new(KMeansClusterer::new(iterations)),
        }
    }
}

/// State produced by a successful freeze
struct Trained<O> {
    transform: PivotTransform<O>,
    medians: Vec<f64>,
    partitioning: Box<dyn Partitioning>,
}

enum Lifecycle<O> {
    Unfrozen,
    Freezing,
    Frozen(Arc<Trained<O>>),
}

/// Pivot-based metric-space index
pub struct MetricIndex<O> {
    config: IndexConfig,
    metric: Arc<dyn Metric<O>>,
    codec: Arc<dyn ObjectCodec<O>>,
    selector: Arc<dyn PivotSelector>,
    components: Components,
    lifecycle: RwLock<Lifecycle<O>>,
    digests: DashMap<ContentDigest, ObjectId>,
    next_id: AtomicU64,
    metrics: Metrics,
}

impl<O> MetricIndex<O>
where
    O: Clone + Send + Sync + 'static,
{
    /// Create an index over in-memory stores
    pub fn new(
        config: IndexConfig,
        metric: Arc<dyn Metric<O>>,
        codec: Arc<dyn ObjectCodec<O>>,
        selector: Arc<dyn PivotSelector>,
    ) -> Result<Self> {
        let components = Components::in_memory(&config);
        Self::with_components(config, metric, codec, selector, components)
    }

    pub fn with_components(
        config: IndexConfig,
        metric: Arc<dyn Metric<O>>,
        codec: Arc<dyn ObjectCodec<O>>,
        selector: Arc<dyn PivotSelector>,
        components: Components,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            strategy = config.strategy.name(),
            pivots = config.pivot_count,
            metric = metric.name(),
            "Index created"
        );
        Ok(Self {
            config,
            metric,
            codec,
            selector,
            components,
            lifecycle: RwLock::new(Lifecycle::Unfrozen),
            digests: DashMap::new(),
            next_id: AtomicU64::new(0),
            metrics: Metrics::new(),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn state(&self) -> IndexState {
        match &*self.lifecycle.read() {
            Lifecycle::Unfrozen => IndexState::Unfrozen,
            Lifecycle::Freezing => IndexState::Freezing,
            Lifecycle::Frozen(_) => IndexState::Frozen,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.state() == IndexState::Frozen
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of stored objects
    pub fn len(&self) -> Result<usize> {
        self.components.object_store.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn trained(&self) -> Result<Arc<Trained<O>>> {
        match &*self.lifecycle.read() {
            Lifecycle::Frozen(trained) => Ok(Arc::clone(trained)),
            _ => Err(Error::NotFrozen),
        }
    }

    /// Store an object; indexed immediately when frozen
    pub fn insert(&self, object: O) -> Result<InsertOutcome> {
        let bytes = self.codec.encode(&object);
        let digest = ContentDigest::of(&bytes);

        // Held for the whole insert so a freeze cannot start half-way through
        let lifecycle = self.lifecycle.read();
        if let Lifecycle::Freezing = &*lifecycle {
            return Err(Error::FreezeInProgress);
        }

        // The vacant entry keeps the digest shard locked until the object is
        // fully stored, so a concurrent duplicate never sees a rolled-back id
        let vacant = match self.digests.entry(digest) {
            Entry::Occupied(e) => {
                self.metrics.record_duplicate();
                return Ok(InsertOutcome::Exists(*e.get()));
            }
            Entry::Vacant(v) => v,
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        self.components
            .object_store
            .put(SortKey::for_object(id), Bytes::from(bytes))?;

        let outcome = match &*lifecycle {
            Lifecycle::Frozen(trained) => match self.index_frozen(trained, id, &object) {
                Ok(outcome) => outcome,
                Err(e) => {
                    trained.transform.invalidate(id);
                    if let Err(undo) = self.components.object_store.delete(id) {
                        warn!(id, error = %undo, "Failed to remove object after index error");
                    }
                    warn!(id, error = %e, code = e.error_code(), "Insert rolled back");
                    return Err(e);
                }
            },
            _ => InsertOutcome::Inserted(id),
        };

        vacant.insert(id);
        self.metrics.record_insert();
        Ok(outcome)
    }

    fn index_frozen(
        &self,
        trained: &Trained<O>,
        id: ObjectId,
        object: &O,
    ) -> Result<InsertOutcome> {
        match trained.transform.cached_tuple(id, object) {
            Ok(tuple) => {
                trained.partitioning.index(id, &tuple)?;
                Ok(InsertOutcome::Inserted(id))
            }
            Err(Error::OutOfRange {
                pivot,
                value,
                min,
                max,
            }) => {
                warn!(
                    id,
                    pivot,
                    value,
                    min,
                    max,
                    "Distance outside declared bounds, record not indexed"
                );
                self.metrics.record_excluded();
                Ok(InsertOutcome::Excluded(id))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether byte-identical content is stored
    pub fn exists(&self, object: &O) -> bool {
        let digest = ContentDigest::of(&self.codec.encode(object));
        self.digests.contains_key(&digest)
    }

    pub fn get_object_by_id(&self, id: ObjectId) -> Result<O> {
        match self.components.object_store.get(id)? {
            Some(bytes) => self.codec.decode(&bytes),
            None => Err(Error::ObjectNotFound { id }),
        }
    }

    /// Remove an object from the object table and the trained structure.
    /// Returns `false` when the id is unknown.
    pub fn delete(&self, id: ObjectId) -> Result<bool> {
        let lifecycle = self.lifecycle.read();
        if let Lifecycle::Freezing = &*lifecycle {
            return Err(Error::FreezeInProgress);
        }

        let bytes = match self.components.object_store.get(id)? {
            Some(bytes) => bytes,
            None => return Ok(false),
        };

        if let Lifecycle::Frozen(trained) = &*lifecycle {
            let object = self.codec.decode(&bytes)?;
            match trained.transform.cached_tuple(id, &object) {
                Ok(tuple) => {
                    trained.partitioning.remove(id, &tuple)?;
                }
                // Excluded records were never indexed
                Err(Error::OutOfRange { .. }) => {}
                Err(e) => return Err(e),
            }
            trained.transform.invalidate(id);
        }

        let removed = self.components.object_store.delete(id)?;
        self.digests
            .remove_if(&ContentDigest::of(&bytes), |_, owner| *owner == id);
        if removed {
            self.metrics.record_delete();
        }
        Ok(removed)
    }

    /// Train the configured strategy on every staged object
    pub fn freeze(&self) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.write();
            match &*lifecycle {
                Lifecycle::Unfrozen => *lifecycle = Lifecycle::Freezing,
                Lifecycle::Freezing => return Err(Error::FreezeInProgress),
                Lifecycle::Frozen(_) => return Err(Error::AlreadyFrozen),
            }
        }

        let timer = Timer::new("freeze");
        match self.build() {
            Ok(trained) => {
                let boxes = trained.partitioning.total_boxes();
                *self.lifecycle.write() = Lifecycle::Frozen(Arc::new(trained));
                self.metrics.record_freeze(true);
                let duration = timer.stop();
                info!(
                    strategy = self.config.strategy.name(),
                    boxes,
                    duration_ms = duration.as_millis() as u64,
                    "Index frozen"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(clear_err) = self.clear_strategy_stores() {
                    warn!(error = %clear_err, "Failed to clear partially built structures");
                }
                *self.lifecycle.write() = Lifecycle::Unfrozen;
                self.metrics.record_freeze(false);
                warn!(error = %e, code = e.error_code(), "Freeze failed, index rolled back");
                Err(e)
            }
        }
    }

    fn clear_strategy_stores(&self) -> Result<()> {
        self.components.key_store.clear()?;
        self.components.bucket_store.clear()
    }

    fn build(&self) -> Result<Trained<O>> {
        let rows = self.components.object_store.scan_all()?;
        let objects: Vec<(ObjectId, O)> = rows
            .par_iter()
            .map(|(key, bytes)| -> Result<(ObjectId, O)> {
                Ok((key.id, self.codec.decode(bytes)?))
            })
            .collect::<Result<_>>()?;
        info!(
            objects = objects.len(),
            strategy = self.config.strategy.name(),
            "Freezing index"
        );

        // Pivots
        let ids: Vec<ObjectId> = objects.iter().map(|(id, _)| *id).collect();
        let pivot_ids = self
            .selector
            .choose_pivot_ids(self.config.pivot_count, Some(&ids))?;
        if pivot_ids.len() != self.config.pivot_count {
            return Err(Error::PivotsUnavailable {
                requested: self.config.pivot_count,
                available: pivot_ids.len(),
            });
        }
        let pivots = pivot_ids
            .iter()
            .map(|&pid| self.get_object_by_id(pid))
            .collect::<Result<Vec<O>>>()?;
        debug!(pivots = ?pivot_ids, "Pivots selected");

        let transform = PivotTransform::new(
            pivot_ids,
            pivots,
            Arc::clone(&self.metric),
            self.config.bounds(),
            self.config.tuple_cache_capacity,
            self.metrics.clone(),
        );

        // Tuples, one slot per object
        let timer = Timer::new("freeze.tuples");
        let records: Vec<(ObjectId, PivotTuple)> = objects
            .par_iter()
            .map(|(id, object)| -> Result<(ObjectId, PivotTuple)> {
                Ok((*id, transform.tuple(object)?))
            })
            .collect::<Result<_>>()?;
        timer.stop();

        let timer = Timer::new("freeze.medians");
        let tuples: Vec<PivotTuple> = records.iter().map(|(_, t)| t.clone()).collect();
        let medians = median_vector(&tuples, self.config.median_sample_size, self.config.seed)?;
        timer.stop();
        debug!(medians = ?medians, "Medians estimated");

        let timer = Timer::new("freeze.train");
        let mut partitioning = self.new_partitioning();
        partitioning.train(&TrainingSet {
            records: &records,
            medians: &medians,
            seed: self.config.seed,
        })?;
        timer.stop();

        for (id, tuple) in records {
            transform.remember(id, tuple);
        }

        Ok(Trained {
            transform,
            medians,
            partitioning,
        })
    }

    fn new_partitioning(&self) -> Box<dyn Partitioning> {
        let bounds = self.config.bounds();
        let d = self.config.pivot_count;
        match &self.config.strategy {
            StrategyConfig::Pyramid => Box::new(PyramidPartitioning::new(
                d,
                bounds,
                PyramidMode::Extended,
                Arc::clone(&self.components.key_store),
            )),
            StrategyConfig::SpaceTree {
                depth,
                cluster_retries,
                ..
            } => Box::new(PyramidPartitioning::new(
                d,
                bounds,
                PyramidMode::SpaceTree {
                    depth: *depth,
                    retries: *cluster_retries,
                    clusterer: Arc::clone(&self.components.clusterer),
                },
                Arc::clone(&self.components.key_store),
            )),
            StrategyConfig::BucketSplit => Box::new(BucketPartitioning::new(
                d,
                bounds,
                Arc::clone(&self.components.bucket_store),
                self.config.cache.container_capacity,
                self.config.histogram_bins,
            )),
        }
    }

    /// Pivot objects in pivot order
    pub fn pivots(&self) -> Result<Vec<O>> {
        Ok(self.trained()?.transform.pivots().to_vec())
    }

    /// Per-pivot medians estimated at freeze
    pub fn medians(&self) -> Result<Vec<f64>> {
        Ok(self.trained()?.medians.clone())
    }

    /// Box of an object under the trained strategy
    pub fn get_box(&self, object: &O) -> Result<u64> {
        let trained = self.trained()?;
        let tuple = trained.transform.tuple(object)?;
        Ok(trained.partitioning.assign(&tuple))
    }

    /// Number of boxes the configured strategy partitions into
    pub fn total_boxes(&self) -> u64 {
        if let Ok(trained) = self.trained() {
            return trained.partitioning.total_boxes();
        }
        let d = self.config.pivot_count as u32;
        match self.config.strategy {
            StrategyConfig::SpaceTree { depth, .. } if depth > 0 => 1u64 << depth,
            StrategyConfig::Pyramid | StrategyConfig::SpaceTree { .. } => 2 * u64::from(d),
            StrategyConfig::BucketSplit => 1u64 << d,
        }
    }

    /// Up to `k` objects within `radius` of `query`, nearest first
    pub fn search_range(&self, query: &O, radius: f64, k: usize) -> Result<Vec<SearchHit<O>>> {
        let mut stats = QueryStats::new();
        self.search_range_with_stats(query, radius, k, &mut stats)
    }

    /// [`search_range`](Self::search_range), adding the query's work to `stats`
    pub fn search_range_with_stats(
        &self,
        query: &O,
        radius: f64,
        k: usize,
        stats: &mut QueryStats,
    ) -> Result<Vec<SearchHit<O>>> {
        if radius.is_nan() || radius < 0.0 {
            return Err(Error::InvalidQuery {
                message: format!("radius must be a non-negative number, got {}", radius),
            });
        }
        let trained = self.trained()?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let tuple = trained.transform.tuple_unchecked(query);
        let mut sink = QuerySink {
            query,
            tuple,
            radius,
            slack: FLOAT_SLACK * self.config.bounds().width(),
            metric: self.metric.as_ref(),
            codec: self.codec.as_ref(),
            objects: self.components.object_store.as_ref(),
            results: BoundedResultSet::new(k),
            stats: QueryStats::new(),
        };
        sink.stats.distance_computations += trained.transform.pivot_count() as u64;

        trained.partitioning.search(&mut sink)?;

        self.metrics.record_query(&sink.stats);
        stats.merge(&sink.stats);
        Ok(sink.results.into_sorted_vec())
    }
}

/// Verifies candidates for one query
struct QuerySink<'a, O> {
    query: &'a O,
    tuple: PivotTuple,
    radius: f64,
    slack: f64,
    metric: &'a dyn Metric<O>,
    codec: &'a dyn ObjectCodec<O>,
    objects: &'a dyn OrderedStore,
    results: BoundedResultSet<O>,
    stats: QueryStats,
}

impl<'a, O> CandidateSink for QuerySink<'a, O> {
    fn radius(&self) -> f64 {
        self.results.update_range(self.radius) + self.slack
    }

    fn query_tuple(&self) -> &[f64] {
        &self.tuple
    }

    fn offer(&mut self, id: ObjectId, tuple: &[f64]) -> Result<()> {
        self.stats.candidates_examined += 1;

        // Lower bound on the real distance
        let bound = chebyshev(tuple, &self.tuple);
        if bound > self.radius() || !self.results.is_candidate(bound - self.slack) {
            self.stats.smap_pruned += 1;
            return Ok(());
        }

        let bytes = match self.objects.get(id)? {
            Some(bytes) => bytes,
            // Deleted since the record was read
            None => return Ok(()),
        };
        let object = self.codec.decode(&bytes)?;
        let distance = self.metric.distance(self.query, &object);
        self.stats.distance_computations += 1;

        if distance <= self.radius {
            self.results.add(id, object, distance);
        }
        Ok(())
    }

    fn stats(&mut self) -> &mut QueryStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StringCodec;
    use crate::distance::EditDistance;
    use crate::selector::FixedPivotSelector;

    fn index(strategy: StrategyConfig) -> MetricIndex<String> {
        let config = IndexConfig {
            pivot_count: 2,
            min_distance: 0.0,
            max_distance: 10.0,
            strategy,
            ..Default::default()
        };
        MetricIndex::new(
            config,
            Arc::new(EditDistance),
            Arc::new(StringCodec),
            Arc::new(FixedPivotSelector::new(vec![0, 3])),
        )
        .unwrap()
    }

    fn load(idx: &MetricIndex<String>) {
        for s in ["a", "ab", "abc", "abcd", "b"] {
            idx.insert(s.to_string()).unwrap();
        }
    }

    #[test]
    fn test_lifecycle_states() {
        let idx = index(StrategyConfig::Pyramid);
        assert_eq!(idx.state(), IndexState::Unfrozen);
        assert!(matches!(
            idx.search_range(&"a".to_string(), 1.0, 1),
            Err(Error::NotFrozen)
        ));
        assert!(matches!(idx.get_box(&"a".to_string()), Err(Error::NotFrozen)));

        load(&idx);
        idx.freeze().unwrap();
        assert!(idx.is_frozen());
        assert!(matches!(idx.freeze(), Err(Error::AlreadyFrozen)));
        assert_eq!(idx.metrics().freezes, 1);
    }

    #[test]
    fn test_failed_freeze_rolls_back() {
        let idx = index(StrategyConfig::Pyramid);
        idx.insert("a".to_string()).unwrap();
        // Pivot id 3 is not stored yet
        let err = idx.freeze().unwrap_err();
        assert!(matches!(err, Error::PivotsUnavailable { requested: 2, available: 1 }));
        assert_eq!(idx.state(), IndexState::Unfrozen);
        assert_eq!(idx.metrics().failed_freezes, 1);

        for s in ["ab", "abc", "abcd"] {
            idx.insert(s.to_string()).unwrap();
        }
        idx.freeze().unwrap();
        assert!(idx.is_frozen());
    }

    #[test]
    fn test_freeze_out_of_range_is_fatal() {
        let idx = index(StrategyConfig::Pyramid);
        load(&idx);
        idx.insert("zzzzzzzzzzzzzzz".to_string()).unwrap();
        assert!(matches!(idx.freeze(), Err(Error::OutOfRange { .. })));
        assert_eq!(idx.state(), IndexState::Unfrozen);
    }

    #[test]
    fn test_duplicate_insert() {
        let idx = index(StrategyConfig::Pyramid);
        assert_eq!(idx.insert("a".to_string()).unwrap(), InsertOutcome::Inserted(0));
        assert_eq!(idx.insert("a".to_string()).unwrap(), InsertOutcome::Exists(0));
        assert!(idx.exists(&"a".to_string()));
        assert!(!idx.exists(&"b".to_string()));
        assert_eq!(idx.len().unwrap(), 1);
        assert_eq!(idx.metrics().duplicates_rejected, 1);
    }

    #[test]
    fn test_invalid_radius() {
        let idx = index(StrategyConfig::Pyramid);
        load(&idx);
        idx.freeze().unwrap();
        assert!(matches!(
            idx.search_range(&"a".to_string(), -1.0, 1),
            Err(Error::InvalidQuery { .. })
        ));
        assert!(matches!(
            idx.search_range(&"a".to_string(), f64::NAN, 1),
            Err(Error::InvalidQuery { .. })
        ));
        assert!(idx.search_range(&"a".to_string(), 1.0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_boxes_per_strategy() {
        let pyramid = index(StrategyConfig::Pyramid);
        assert_eq!(pyramid.total_boxes(), 4);
        let tree = index(StrategyConfig::space_tree(1));
        assert_eq!(tree.total_boxes(), 2);
        let buckets = index(StrategyConfig::BucketSplit);
        assert_eq!(buckets.total_boxes(), 4);

        load(&buckets);
        buckets.freeze().unwrap();
        // Medians are [1, 2]; "b" = [1, 3] splits high on pivot 1 only
        assert_eq!(buckets.medians().unwrap(), vec![1.0, 2.0]);
        assert_eq!(buckets.get_box(&"b".to_string()).unwrap(), 0b10);
        assert_eq!(buckets.get_box(&"abcd".to_string()).unwrap(), 0b01);
    }
}
