//! # Pyramid Partitioning
//!
//! Extended pyramid technique over the whole tuple space, or one local
//! pyramid per space-tree leaf (P+Tree). Records are stored in an ordered
//! store under their pyramid key; a range query becomes a handful of key
//! range scans.
//!
//! ## Search
//!
//! ```text
//! query tuple ──► rectangle ──► leaves ──► pyramids ──► key ranges
//!                                                          │
//!                       radius shrinks ◄── offer ◄── range scan
//!                             │
//!                             └──► re-plan the ranges not yet scanned
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use pivotdb_core::serialization::{decode_tuple_record, encode_tuple_record};
use pivotdb_core::{
    Clusterer, DistanceBounds, Interval, ObjectId, OrderedStore, PivotTuple, Result, SortKey,
};

use crate::pyramid::{decompose, height, pyramid_number, LocalTransform};
use crate::space_tree::{BuildOptions, SpaceTree};
use crate::traits::{CandidateSink, Partitioning, TrainingSet};

/// How the tuple space is divided before the pyramid mapping
#[derive(Clone)]
pub enum PyramidMode {
    /// One global pyramid space centered on the medians
    Extended,
    /// P+Tree with `2^depth` leaves
    SpaceTree {
        depth: usize,
        retries: usize,
        clusterer: Arc<dyn Clusterer>,
    },
}

/// One pyramid's slice of the key space
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScanRange {
    /// `leaf_sequence * 2d + pyramid`
    slot: u64,
    low: f64,
    high: f64,
}

#[inline]
fn key_at(slot: u64, height: f64) -> f64 {
    slot as f64 + height
}

pub struct PyramidPartitioning {
    pivot_count: usize,
    bounds: DistanceBounds,
    mode: PyramidMode,
    tree: SpaceTree,
    store: Arc<dyn OrderedStore>,
}

impl PyramidPartitioning {
    pub fn new(
        pivot_count: usize,
        bounds: DistanceBounds,
        mode: PyramidMode,
        store: Arc<dyn OrderedStore>,
    ) -> Self {
        Self {
            pivot_count,
            bounds,
            mode,
            tree: SpaceTree::single(LocalTransform::global(&vec![0.5; pivot_count])),
            store,
        }
    }

    /// Leaf sequence and pyramid slot of a raw tuple, plus its height
    fn locate(&self, tuple: &[f64]) -> (u64, u64, f64) {
        let normalized = self.bounds.normalize_tuple(tuple);
        let leaf = self.tree.leaf_of(&normalized);
        let t = leaf.transform.center_point(&normalized);
        let slot = leaf.sequence * 2 * self.pivot_count as u64 + pyramid_number(&t) as u64;
        (leaf.sequence, slot, height(&t))
    }

    /// Sort key of a raw tuple
    pub fn key_of(&self, tuple: &[f64]) -> f64 {
        let (_, slot, h) = self.locate(tuple);
        key_at(slot, h)
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    /// Key ranges that cover every tuple within `radius` of `query`
    fn plan(&self, query: &[f64], radius: f64) -> Vec<ScanRange> {
        let rect = match self.bounds.query_rect(query, radius) {
            Some(rect) => rect,
            None => return Vec::new(),
        };
        let normalized: Vec<Interval> = rect
            .iter()
            .map(|iv| Interval::new(self.bounds.normalize(iv.min), self.bounds.normalize(iv.max)))
            .collect();

        let mut ranges = Vec::new();
        for leaf in self.tree.leaves_intersecting(&normalized) {
            let centered = leaf.transform.center_rect(&normalized);
            let offset = leaf.sequence * 2 * self.pivot_count as u64;
            for (pyramid, low, high) in decompose(&centered) {
                let slot = offset + pyramid as u64;
                ranges.push(ScanRange {
                    slot,
                    low: key_at(slot, low),
                    high: key_at(slot, high),
                });
            }
        }
        ranges
    }
}

impl Partitioning for PyramidPartitioning {
    fn name(&self) -> &'static str {
        match self.mode {
            PyramidMode::Extended => "pyramid",
            PyramidMode::SpaceTree { .. } => "space_tree",
        }
    }

    fn train(&mut self, training: &TrainingSet<'_>) -> Result<()> {
        let normalized_medians: Vec<f64> = training
            .medians
            .iter()
            .map(|&m| self.bounds.normalize(m))
            .collect();

        self.tree = match &self.mode {
            PyramidMode::SpaceTree {
                depth,
                retries,
                clusterer,
            } if *depth > 0 => {
                let points: Vec<Vec<f64>> = training
                    .records
                    .par_iter()
                    .map(|(_, t)| self.bounds.normalize_tuple(t))
                    .collect();
                SpaceTree::build(
                    &points,
                    &BuildOptions {
                        depth: *depth,
                        retries: *retries,
                        seed: training.seed,
                        clusterer: Arc::clone(clusterer),
                    },
                )?
            }
            _ => SpaceTree::single(LocalTransform::global(&normalized_medians)),
        };

        self.index_batch(training.records)?;
        debug!(
            strategy = self.name(),
            leaves = self.tree.leaf_count(),
            records = training.records.len(),
            "Pyramid partitioning trained"
        );
        Ok(())
    }

    fn assign(&self, tuple: &[f64]) -> u64 {
        let (leaf, slot, _) = self.locate(tuple);
        match self.mode {
            PyramidMode::SpaceTree { depth, .. } if depth > 0 => leaf,
            // A depth-0 tree is the plain extended pyramid
            _ => slot,
        }
    }

    fn total_boxes(&self) -> u64 {
        match self.mode {
            PyramidMode::SpaceTree { depth, .. } if depth > 0 => 1u64 << depth,
            _ => 2 * self.pivot_count as u64,
        }
    }

    fn index(&self, id: ObjectId, tuple: &[f64]) -> Result<()> {
        let key = self.key_of(tuple);
        self.store.put(SortKey::new(key, id), encode_tuple_record(id, tuple))
    }

    fn index_batch(&self, records: &[(ObjectId, PivotTuple)]) -> Result<()> {
        records.par_iter().try_for_each(|(id, tuple)| self.index(*id, tuple))
    }

    fn remove(&self, id: ObjectId, _tuple: &[f64]) -> Result<bool> {
        self.store.delete(id)
    }

    fn search(&self, sink: &mut dyn CandidateSink) -> Result<()> {
        let query = sink.query_tuple().to_vec();
        let mut radius = sink.radius();
        let mut pending = self.plan(&query, radius);
        let mut done: HashSet<u64> = HashSet::new();

        while let Some(range) = pending.iter().find(|r| !done.contains(&r.slot)).copied() {
            done.insert(range.slot);
            let mut high = range.high;

            let rows = self
                .store
                .range_scan(SortKey::lower_bound(range.low), SortKey::upper_bound(range.high))?;
            sink.stats().ranges_scanned += 1;

            for (key, value) in rows {
                if key.value() > high {
                    break;
                }
                let (id, tuple) = decode_tuple_record(&value)?;
                sink.offer(id, &tuple)?;

                let next = sink.radius();
                if next < radius {
                    radius = next;
                    sink.stats().radius_tightenings += 1;
                    pending = self.plan(&query, radius);
                    match pending.iter().find(|r| r.slot == range.slot) {
                        Some(r) => high = high.min(r.high),
                        // The pyramid no longer intersects
                        None => break,
                    }
                }
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}
