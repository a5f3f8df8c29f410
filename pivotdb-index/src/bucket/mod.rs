//! # Pivot-Split Buckets (D′-Index)
//!
//! Every pivot splits the data at its median, so a tuple lands in exactly one
//! of `2^d` buckets. A query walks the bucket-id bits pivot by pivot, pruning
//! prefixes with the existence filter and whole containers with their MBR.
//!
//! ## Write path
//!
//! ```text
//! bucket lock ──► load or create ──► extend MBR, append ──► invalidate
//!                                                              │
//!        register prefixes (new bucket) ◄── refresh cache ◄── persist
//! ```
//!
//! Cache misses are filled under the same bucket lock, so a reader never
//! publishes a container older than the last persisted one.

pub mod container;
pub mod distribution;
pub mod filter;
pub mod split;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use pivotdb_core::error::ResultExt;
use pivotdb_core::{BucketStore, DistanceBounds, Interval, ObjectId, PivotTuple, Result};
use pivotdb_storage::ContainerCache;

use crate::traits::{CandidateSink, Partitioning, TrainingSet};

pub use container::{BucketContainer, BucketMember};
pub use distribution::DistanceDistribution;
pub use filter::ExistenceFilter;
pub use split::{bps, bps_exclusion, bps_range, bucket_id, ObjectBucket, SplitRange};

pub struct BucketPartitioning {
    pivot_count: usize,
    bounds: DistanceBounds,
    medians: Vec<f64>,
    store: Arc<dyn BucketStore>,
    cache: ContainerCache<BucketContainer>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
    filter: ExistenceFilter,
    distribution: DistanceDistribution,
}

impl BucketPartitioning {
    pub fn new(
        pivot_count: usize,
        bounds: DistanceBounds,
        store: Arc<dyn BucketStore>,
        cache_capacity: usize,
        histogram_bins: usize,
    ) -> Self {
        Self {
            pivot_count,
            bounds,
            medians: vec![bounds.min + bounds.width() / 2.0; pivot_count],
            store,
            cache: ContainerCache::new(cache_capacity),
            locks: DashMap::new(),
            filter: ExistenceFilter::new(pivot_count),
            distribution: DistanceDistribution::new(pivot_count, bounds, histogram_bins),
        }
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn cache_stats(&self) -> pivotdb_storage::CacheStats {
        self.cache.stats()
    }

    /// Number of buckets holding a container
    pub fn populated_buckets(&self) -> usize {
        self.filter.populated()
    }

    fn lock_for(&self, bucket: u64) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(bucket)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Load a container with the bucket lock already held
    fn load_locked(&self, bucket: u64) -> Result<Option<Arc<BucketContainer>>> {
        if let Some(c) = self.cache.get(bucket) {
            return Ok(Some(c));
        }
        match self.store.get(bucket)? {
            Some(bytes) => {
                let container = BucketContainer::decode(&bytes)
                    .with_context(|| format!("bucket {:#x}", bucket))?;
                let container = Arc::new(container);
                self.cache.insert(bucket, Arc::clone(&container));
                Ok(Some(container))
            }
            None => Ok(None),
        }
    }

    /// Read-through container lookup
    pub fn container(&self, bucket: u64) -> Result<Option<Arc<BucketContainer>>> {
        if let Some(c) = self.cache.get(bucket) {
            return Ok(Some(c));
        }
        let lock = self.lock_for(bucket);
        let _guard = lock.lock();
        self.load_locked(bucket)
    }

    /// Apply `update` to a bucket's container under its lock and persist it
    fn write<F>(&self, bucket: u64, update: F) -> Result<bool>
    where
        F: FnOnce(&mut BucketContainer) -> bool,
    {
        let lock = self.lock_for(bucket);
        let _guard = lock.lock();

        let (mut container, created) = match self.load_locked(bucket)? {
            Some(c) => (c.as_ref().clone(), false),
            None => (BucketContainer::new(0, self.pivot_count), true),
        };
        if !update(&mut container) {
            return Ok(false);
        }

        self.cache.invalidate(bucket);
        self.store.put(bucket, container.encode())?;
        self.cache.insert(bucket, Arc::new(container));
        if created {
            self.filter.register(bucket);
        }
        Ok(true)
    }

    /// Walk bucket-id bits from pivot `level` on
    fn traverse(&self, level: usize, partial: u64, sink: &mut dyn CandidateSink) -> Result<()> {
        if level == self.pivot_count {
            return self.visit(partial, sink);
        }

        let median = self.medians[level];
        let radius = sink.radius();
        let q = sink.query_tuple()[level];
        let reach = bps_range(median, q - radius, q + radius);

        let upper_first = reach == SplitRange::Both
            && self
                .distribution
                .prefers_upper(level, median, q - radius, q + radius);
        let order: [u8; 2] = if upper_first { [1, 0] } else { [0, 1] };

        for bit in order {
            // The radius may have shrunk while the first branch was scanned
            let radius = sink.radius();
            let reach = bps_range(median, q - radius, q + radius);
            let viable = if bit == 0 { reach.lower() } else { reach.upper() };
            if !viable {
                continue;
            }

            let next = partial | (u64::from(bit) << level);
            if !self.filter.may_contain(level + 1, next) {
                sink.stats().buckets_filtered += 1;
                continue;
            }
            self.traverse(level + 1, next, sink)?;
        }
        Ok(())
    }

    fn visit(&self, bucket: u64, sink: &mut dyn CandidateSink) -> Result<()> {
        let container = match self.container(bucket)? {
            Some(c) => c,
            None => return Ok(()),
        };
        sink.stats().buckets_visited += 1;

        let radius = sink.radius();
        let rect: Vec<Interval> = sink
            .query_tuple()
            .iter()
            .map(|&q| Interval::new(q - radius, q + radius))
            .collect();
        if !container.collides(&rect) {
            sink.stats().buckets_pruned_mbr += 1;
            return Ok(());
        }

        for member in &container.members {
            sink.offer(member.id, &member.smap)?;
        }
        Ok(())
    }
}

impl Partitioning for BucketPartitioning {
    fn name(&self) -> &'static str {
        "bucket_split"
    }

    fn train(&mut self, training: &TrainingSet<'_>) -> Result<()> {
        self.medians = training.medians.to_vec();
        training
            .records
            .par_iter()
            .for_each(|(_, tuple)| self.distribution.record(tuple));

        self.index_batch(training.records)?;
        debug!(
            records = training.records.len(),
            buckets = self.filter.populated(),
            "Bucket partitioning trained"
        );
        Ok(())
    }

    fn assign(&self, tuple: &[f64]) -> u64 {
        bucket_id(&self.medians, tuple)
    }

    fn total_boxes(&self) -> u64 {
        1u64 << self.pivot_count
    }

    fn index(&self, id: ObjectId, tuple: &[f64]) -> Result<()> {
        let placement = ObjectBucket::place(&self.medians, tuple);
        self.distribution.record(tuple);
        self.write(placement.bucket_id, |c| {
            c.push(BucketMember {
                id,
                smap: placement.smap_vector,
            });
            true
        })?;
        Ok(())
    }

    fn index_batch(&self, records: &[(ObjectId, PivotTuple)]) -> Result<()> {
        let mut groups: HashMap<u64, Vec<BucketMember>> = HashMap::new();
        for (id, tuple) in records {
            let placement = ObjectBucket::place(&self.medians, tuple);
            groups.entry(placement.bucket_id).or_default().push(BucketMember {
                id: *id,
                smap: placement.smap_vector,
            });
        }

        // Buckets are independent; each write holds only its own lock
        groups.into_par_iter().try_for_each(|(bucket, members)| {
            self.write(bucket, |c| {
                for m in members {
                    c.push(m);
                }
                true
            })
            .map(|_| ())
        })
    }

    fn remove(&self, id: ObjectId, tuple: &[f64]) -> Result<bool> {
        let bucket = bucket_id(&self.medians, tuple);
        if !self.filter.may_contain(self.pivot_count, bucket) {
            return Ok(false);
        }
        self.write(bucket, |c| c.remove(id))
    }

    fn search(&self, sink: &mut dyn CandidateSink) -> Result<()> {
        if sink.query_tuple().len() != self.pivot_count {
            return Ok(());
        }
        self.traverse(0, 0, sink)
    }

    fn clear(&self) -> Result<()> {
        self.store.clear()?;
        self.cache.clear();
        self.filter.clear();
        Ok(())
    }
}
