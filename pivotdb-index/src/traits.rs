//! # Partitioning Traits
//!
//! Common interface for the partitioning strategies a [`crate::MetricIndex`]
//! can be trained with.

use pivotdb_core::{ObjectId, PivotTuple, QueryStats, Result};

/// Receives candidate records found by a strategy during a search.
///
/// The sink owns the query's result set. Strategies read the working radius
/// back after every offer and shrink their remaining work accordingly.
pub trait CandidateSink {
    /// Current working radius, float tolerance included
    fn radius(&self) -> f64;

    /// Pivot tuple of the query object
    fn query_tuple(&self) -> &[f64];

    /// Verify a stored record against the query
    fn offer(&mut self, id: ObjectId, tuple: &[f64]) -> Result<()>;

    fn stats(&mut self) -> &mut QueryStats;
}

/// Freeze-time input for training
pub struct TrainingSet<'a> {
    pub records: &'a [(ObjectId, PivotTuple)],
    /// Per-pivot medians of the raw distances
    pub medians: &'a [f64],
    pub seed: u64,
}

/// Partitioning strategy trait - implemented by the pyramid and bucket engines
pub trait Partitioning: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fit the strategy's structures and bulk-load the training records
    fn train(&mut self, training: &TrainingSet<'_>) -> Result<()>;

    /// Box of a pivot tuple
    fn assign(&self, tuple: &[f64]) -> u64;

    /// Number of distinct boxes
    fn total_boxes(&self) -> u64;

    /// Index one record
    fn index(&self, id: ObjectId, tuple: &[f64]) -> Result<()>;

    /// Index many records
    fn index_batch(&self, records: &[(ObjectId, PivotTuple)]) -> Result<()> {
        for (id, tuple) in records {
            self.index(*id, tuple)?;
        }
        Ok(())
    }

    /// Remove a record; `false` when it was not indexed
    fn remove(&self, id: ObjectId, tuple: &[f64]) -> Result<bool>;

    /// Offer every record that may lie within the sink's radius
    fn search(&self, sink: &mut dyn CandidateSink) -> Result<()>;

    /// Drop everything written by training and indexing
    fn clear(&self) -> Result<()>;
}
