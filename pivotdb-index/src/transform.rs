//! # Pivot Tuple Transform
//!
//! Maps an object to its distances from every pivot. Tuples of stored objects
//! are kept in a bounded read-through LRU cache keyed by object id; query
//! tuples bypass it.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use pivotdb_core::{DistanceBounds, Error, Metric, Metrics, ObjectId, PivotTuple, Result};

/// Chebyshev (L∞) distance between two tuples.
///
/// By the triangle inequality this never exceeds the metric distance between
/// the objects the tuples were computed for.
#[inline]
pub fn chebyshev(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

pub struct PivotTransform<O> {
    pivots: Vec<O>,
    pivot_ids: Vec<ObjectId>,
    metric: Arc<dyn Metric<O>>,
    bounds: DistanceBounds,
    cache: Mutex<LruCache<ObjectId, PivotTuple>>,
    metrics: Metrics,
}

impl<O> PivotTransform<O> {
    pub fn new(
        pivot_ids: Vec<ObjectId>,
        pivots: Vec<O>,
        metric: Arc<dyn Metric<O>>,
        bounds: DistanceBounds,
        cache_capacity: usize,
        metrics: Metrics,
    ) -> Self {
        Self {
            pivots,
            pivot_ids,
            metric,
            bounds,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            metrics,
        }
    }

    pub fn pivot_count(&self) -> usize {
        self.pivots.len()
    }

    pub fn pivots(&self) -> &[O] {
        &self.pivots
    }

    pub fn pivot_ids(&self) -> &[ObjectId] {
        &self.pivot_ids
    }

    pub fn bounds(&self) -> DistanceBounds {
        self.bounds
    }

    /// Distances to every pivot; fails with `OutOfRange` when one falls
    /// outside the declared bounds
    pub fn tuple(&self, object: &O) -> Result<PivotTuple> {
        let tuple = self.tuple_unchecked(object);
        self.metrics.record_distances(tuple.len() as u64);
        for (pivot, &value) in tuple.iter().enumerate() {
            if !self.bounds.contains(value) {
                return Err(Error::OutOfRange {
                    pivot,
                    value,
                    min: self.bounds.min,
                    max: self.bounds.max,
                });
            }
        }
        Ok(tuple)
    }

    /// Distances to every pivot without the bounds check
    pub fn tuple_unchecked(&self, object: &O) -> PivotTuple {
        self.pivots
            .iter()
            .map(|p| self.metric.distance(object, p))
            .collect()
    }

    /// Checked tuple of a stored object, served from the cache when present
    pub fn cached_tuple(&self, id: ObjectId, object: &O) -> Result<PivotTuple> {
        if let Some(tuple) = self.cache.lock().get(&id) {
            return Ok(tuple.clone());
        }
        let tuple = self.tuple(object)?;
        self.remember(id, tuple.clone());
        Ok(tuple)
    }

    pub fn remember(&self, id: ObjectId, tuple: PivotTuple) {
        self.cache.lock().put(id, tuple);
    }

    pub fn invalidate(&self, id: ObjectId) {
        self.cache.lock().pop(&id);
    }

    #[inline]
    pub fn normalize(&self, value: f64) -> f64 {
        self.bounds.normalize(value)
    }

    pub fn normalize_tuple(&self, tuple: &[f64]) -> Vec<f64> {
        self.bounds.normalize_tuple(tuple)
    }
}
