//! # Metrics and Statistics
//!
//! Index-wide counters owned by each index instance, per-query statistics
//! owned by the caller, and the atomic histogram used for distance
//! distributions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    // Write metrics
    objects_inserted: AtomicU64,
    duplicates_rejected: AtomicU64,
    records_excluded: AtomicU64,
    objects_deleted: AtomicU64,

    // Lifecycle metrics
    freezes: AtomicU64,
    failed_freezes: AtomicU64,

    // Query metrics
    queries_executed: AtomicU64,
    distance_computations: AtomicU64,
    smap_pruned: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stored object
    pub fn record_insert(&self) {
        self.inner.objects_inserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an insert rejected as a duplicate
    pub fn record_duplicate(&self) {
        self.inner.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record left out of the trained structure
    pub fn record_excluded(&self) {
        self.inner.records_excluded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.inner.objects_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_freeze(&self, success: bool) {
        if success {
            self.inner.freezes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.failed_freezes.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fold a finished query's statistics into the totals
    pub fn record_query(&self, stats: &QueryStats) {
        self.inner.queries_executed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .distance_computations
            .fetch_add(stats.distance_computations, Ordering::Relaxed);
        self.inner.smap_pruned.fetch_add(stats.smap_pruned, Ordering::Relaxed);
    }

    /// Record distance computations made outside queries (freeze, inserts)
    pub fn record_distances(&self, count: u64) {
        self.inner.distance_computations.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            objects_inserted: self.inner.objects_inserted.load(Ordering::Relaxed),
            duplicates_rejected: self.inner.duplicates_rejected.load(Ordering::Relaxed),
            records_excluded: self.inner.records_excluded.load(Ordering::Relaxed),
            objects_deleted: self.inner.objects_deleted.load(Ordering::Relaxed),
            freezes: self.inner.freezes.load(Ordering::Relaxed),
            failed_freezes: self.inner.failed_freezes.load(Ordering::Relaxed),
            queries_executed: self.inner.queries_executed.load(Ordering::Relaxed),
            distance_computations: self.inner.distance_computations.load(Ordering::Relaxed),
            smap_pruned: self.inner.smap_pruned.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub objects_inserted: u64,
    pub duplicates_rejected: u64,
    pub records_excluded: u64,
    pub objects_deleted: u64,
    pub freezes: u64,
    pub failed_freezes: u64,
    pub queries_executed: u64,
    pub distance_computations: u64,
    pub smap_pruned: u64,
}

/// Statistics for one query, owned and reset by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Real metric evaluations, including the query-to-pivot distances
    pub distance_computations: u64,
    /// Stored records offered to the verifier
    pub candidates_examined: u64,
    /// Records dropped by the Chebyshev bound without a real distance
    pub smap_pruned: u64,
    /// Key ranges scanned in the ordered store
    pub ranges_scanned: u64,
    /// Times the working radius shrank
    pub radius_tightenings: u64,
    /// Bucket containers loaded
    pub buckets_visited: u64,
    /// Prefixes rejected by the existence filter
    pub buckets_filtered: u64,
    /// Containers rejected by their bounding rectangle
    pub buckets_pruned_mbr: u64,
}

impl QueryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn merge(&mut self, other: &QueryStats) {
        self.distance_computations += other.distance_computations;
        self.candidates_examined += other.candidates_examined;
        self.smap_pruned += other.smap_pruned;
        self.ranges_scanned += other.ranges_scanned;
        self.radius_tightenings += other.radius_tightenings;
        self.buckets_visited += other.buckets_visited;
        self.buckets_filtered += other.buckets_filtered;
        self.buckets_pruned_mbr += other.buckets_pruned_mbr;
    }
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Start new timer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and log duration
    pub fn stop(self) -> Duration {
        let duration = self.elapsed();
        tracing::debug!(
            name = %self.name,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
        duration
    }
}

/// Fixed-width histogram over `[lower, upper]` with atomic bins.
///
/// Values outside the range land in the first or last bin.
pub struct Histogram {
    lower: f64,
    upper: f64,
    bins: Vec<AtomicU64>,
    count: AtomicU64,
}

impl Histogram {
    /// Create a histogram with `bins` equal-width bins
    pub fn uniform(lower: f64, upper: f64, bins: usize) -> Self {
        let bins = bins.max(1);
        Self {
            lower,
            upper,
            bins: (0..bins).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn bin_width(&self) -> f64 {
        (self.upper - self.lower) / self.bins.len() as f64
    }

    #[inline]
    fn bin_of(&self, value: f64) -> usize {
        let width = self.bin_width();
        if width <= 0.0 || value.is_nan() {
            return 0;
        }
        let idx = ((value - self.lower) / width).floor();
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(self.bins.len() - 1)
        }
    }

    /// Record a value
    pub fn record(&self, value: f64) {
        self.bins[self.bin_of(value)].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Total recorded values
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Values recorded in bins overlapping `[lo, hi]`
    pub fn mass_between(&self, lo: f64, hi: f64) -> u64 {
        if lo > hi {
            return 0;
        }
        let first = self.bin_of(lo);
        let last = self.bin_of(hi);
        self.bins[first..=last]
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .sum()
    }

    /// Running totals, one per bin
    pub fn cumulative(&self) -> Vec<u64> {
        let mut total = 0;
        self.bins
            .iter()
            .map(|b| {
                total += b.load(Ordering::Relaxed);
                total
            })
            .collect()
    }
}
