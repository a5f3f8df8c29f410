//! Per-pivot distance distribution used to order bucket traversal.

use pivotdb_core::metrics::Histogram;
use pivotdb_core::DistanceBounds;

pub struct DistanceDistribution {
    histograms: Vec<Histogram>,
}

impl DistanceDistribution {
    pub fn new(pivot_count: usize, bounds: DistanceBounds, bins: usize) -> Self {
        Self {
            histograms: (0..pivot_count)
                .map(|_| Histogram::uniform(bounds.min, bounds.max, bins))
                .collect(),
        }
    }

    pub fn record(&self, tuple: &[f64]) {
        for (hist, &d) in self.histograms.iter().zip(tuple) {
            hist.record(d);
        }
    }

    /// Objects whose distance to `pivot` falls in bins overlapping `[lo, hi]`
    pub fn mass(&self, pivot: usize, lo: f64, hi: f64) -> u64 {
        self.histograms.get(pivot).map_or(0, |h| h.mass_between(lo, hi))
    }

    /// Whether the part of `[lo, hi]` above `median` holds more objects than
    /// the part at or below it
    pub fn prefers_upper(&self, pivot: usize, median: f64, lo: f64, hi: f64) -> bool {
        self.mass(pivot, median, hi) > self.mass(pivot, lo, median)
    }

    pub fn count(&self) -> u64 {
        self.histograms.first().map_or(0, |h| h.count())
    }
}
