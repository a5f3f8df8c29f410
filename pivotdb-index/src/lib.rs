//! # PivotDB Metric Index
//!
//! Pivot-based similarity search over any metric space.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MetricIndex                           │
//! │          (lifecycle: unfrozen → freezing → frozen)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │                 PivotTransform (object → tuple)              │
//! │                              │                               │
//! │         ┌────────────────────┴────────────────────┐          │
//! │  ┌──────────────┐                        ┌──────────────┐   │
//! │  │   Pyramid    │                        │   Buckets    │   │
//! │  │ (+ P+Tree)   │                        │  (D′-Index)  │   │
//! │  └──────────────┘                        └──────────────┘   │
//! │         │                                        │           │
//! │   OrderedStore                             BucketStore       │
//! │         └──────────── BoundedResultSet ──────────┘           │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `aggregator`: top-k result set with radius tightening
//! - `transform`: pivot tuples and the Chebyshev bound
//! - `median`: sampled per-pivot medians
//! - `pyramid`: extended pyramid key and range decomposition
//! - `space_tree`: clustering-based space partition (P+Tree)
//! - `partitioning`: pyramid strategy over an ordered store
//! - `bucket`: median-split bucket strategy (D′-Index)
//! - `index`: the `MetricIndex` lifecycle controller
//! - `distance`, `codec`, `selector`, `cluster`: reference collaborators

pub mod aggregator;
pub mod bucket;
pub mod cluster;
pub mod codec;
pub mod distance;
pub mod index;
pub mod median;
pub mod partitioning;
pub mod pyramid;
pub mod selector;
pub mod space_tree;
pub mod traits;
pub mod transform;

pub use aggregator::BoundedResultSet;
pub use bucket::BucketPartitioning;
pub use cluster::KMeansClusterer;
pub use codec::{StringCodec, VectorCodec};
pub use distance::{
    l1_distance, l2_distance, l2_distance_squared, EditDistance, EuclideanDistance,
    ManhattanDistance,
};
pub use index::{Components, MetricIndex, FLOAT_SLACK};
pub use partitioning::{PyramidMode, PyramidPartitioning};
pub use selector::{FixedPivotSelector, RandomPivotSelector};
pub use traits::{CandidateSink, Partitioning, TrainingSet};
pub use transform::{chebyshev, PivotTransform};
