//! # Core Traits
//!
//! The seams between the index and its collaborators. The index only ever
//! talks to stores, selectors, clusterers, metrics and codecs through these
//! traits; `pivotdb-storage` and `pivotdb-index` ship in-memory reference
//! implementations.

use bytes::Bytes;

use crate::types::{ObjectId, SortKey};
use crate::Result;

/// Distance function over opaque objects.
///
/// Must be symmetric, non-negative and satisfy the triangle inequality.
/// Violations are a caller defect and are not detected.
pub trait Metric<O>: Send + Sync {
    fn distance(&self, a: &O, b: &O) -> f64;

    /// Short name for logs
    fn name(&self) -> &str {
        "custom"
    }
}

/// Encodes objects for the raw-object table and decodes them back
pub trait ObjectCodec<O>: Send + Sync {
    fn encode(&self, object: &O) -> Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<O>;
}

/// Ordered key-value store keyed by [`SortKey`], addressable by object id
pub trait OrderedStore: Send + Sync {
    /// Insert or replace the record for `key.id`
    fn put(&self, key: SortKey, value: Bytes) -> Result<()>;

    /// Records with `low <= key <= high`, in key order
    fn range_scan(&self, low: SortKey, high: SortKey) -> Result<Vec<(SortKey, Bytes)>>;

    /// Record stored for an object id
    fn get(&self, id: ObjectId) -> Result<Option<Bytes>>;

    /// Remove the record for an object id; `false` when absent
    fn delete(&self, id: ObjectId) -> Result<bool>;

    /// Number of records
    fn count(&self) -> Result<usize>;

    /// Every record in key order
    fn scan_all(&self) -> Result<Vec<(SortKey, Bytes)>>;

    /// Drop every record
    fn clear(&self) -> Result<()>;
}

/// Store for bucket containers keyed by bucket id
pub trait BucketStore: Send + Sync {
    fn put(&self, bucket_id: u64, value: Bytes) -> Result<()>;

    fn get(&self, bucket_id: u64) -> Result<Option<Bytes>>;

    /// Number of stored buckets
    fn count(&self) -> Result<usize>;

    fn clear(&self) -> Result<()>;
}

/// Chooses the pivot objects at freeze time
pub trait PivotSelector: Send + Sync {
    /// Ordered ids of `count` representative objects, drawn from `candidates`
    /// when given. Fails with `PivotsUnavailable` when it cannot supply them.
    fn choose_pivot_ids(
        &self,
        count: usize,
        candidates: Option<&[ObjectId]>,
    ) -> Result<Vec<ObjectId>>;
}

/// Splits a point set into two clusters
pub trait Clusterer: Send + Sync {
    /// Centroids of a two-way partition of `points`. The same seed must
    /// produce the same centroids.
    fn bisect(&self, points: &[Vec<f64>], seed: u64) -> Result<[Vec<f64>; 2]>;
}
